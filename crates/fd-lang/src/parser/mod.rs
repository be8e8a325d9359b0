use winnow::prelude::*;

mod expr;

use crate::ast::Expr;
use crate::error::CompileError;
use crate::parse_utils::ws_skip;

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Parse DSL text into an unfolded [`Expr`]. The whole input must be consumed.
pub fn parse_expr(input: &str) -> Result<Expr, CompileError> {
    (ws_skip, expr::parse_expr, ws_skip)
        .map(|(_, e, _)| e)
        .parse(input)
        .map_err(|e| {
            let message = e.inner().to_string();
            CompileError::Syntax {
                offset: e.offset(),
                message: if message.is_empty() {
                    "unexpected input".to_string()
                } else {
                    message
                },
            }
        })
}
