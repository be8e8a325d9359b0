use crate::ast::*;
use crate::error::CompileError;
use crate::parser::parse_expr;
use crate::temporal::parse_temporal;

/// Compile DSL text into a [`CompiledExpr`].
///
/// Empty or whitespace-only text compiles to the constant `true`. After
/// parsing, constants are folded against their context: negated numbers
/// collapse, string constants compared with a temporal operand are parsed to
/// milliseconds, and constant regex sources are compiled.
pub fn compile(text: &str) -> Result<CompiledExpr, CompileError> {
    if text.trim().is_empty() {
        return Ok(CompiledExpr::new(text, Expr::Literal(Literal::Bool(true))));
    }
    let parsed = parse_expr(text)?;
    let folded = fold(parsed, false)?;
    Ok(CompiledExpr::new(text, folded))
}

fn fold(expr: Expr, in_match: bool) -> Result<Expr, CompileError> {
    Ok(match expr {
        Expr::Placeholder(_) if !in_match => return Err(CompileError::StrayPlaceholder),
        Expr::Literal(_)
        | Expr::Field(_)
        | Expr::Placeholder(_)
        | Expr::Exist(_)
        | Expr::Temporal { .. } => expr,
        Expr::Not(inner) => Expr::Not(fold(*inner, in_match)?.boxed()),
        Expr::Neg(inner) => match fold(*inner, in_match)? {
            Expr::Literal(Literal::Int(v)) => Expr::Literal(Literal::Int(-v)),
            Expr::Literal(Literal::Float(v)) => Expr::Literal(Literal::Float(-v)),
            other => Expr::Neg(other.boxed()),
        },
        Expr::Logic { op, left, right } => Expr::Logic {
            op,
            left: fold(*left, in_match)?.boxed(),
            right: fold(*right, in_match)?.boxed(),
        },
        Expr::Arith { op, left, right } => Expr::Arith {
            op,
            left: fold(*left, in_match)?.boxed(),
            right: fold(*right, in_match)?.boxed(),
        },
        Expr::Compare { op, left, right } => {
            let left = fold(*left, in_match)?;
            let right = fold(*right, in_match)?;
            let (left, right) = match (temporal_kind(&left), temporal_kind(&right)) {
                (Some(kind), _) => (left, temporal_const(kind, right)?),
                (None, Some(kind)) => (temporal_const(kind, left)?, right),
                (None, None) => (left, right),
            };
            Expr::Compare {
                op,
                left: left.boxed(),
                right: right.boxed(),
            }
        }
        Expr::StrMatch { op, left, right } => {
            let left = fold(*left, in_match)?.boxed();
            let right = match right {
                StrOperand::Value(v) => match fold(*v, in_match)? {
                    Expr::Literal(Literal::Str(src)) if op == StrOp::Regex => {
                        let pattern = Pattern::new(&src).map_err(|e| CompileError::BadRegex {
                            pattern: src.clone(),
                            reason: e.to_string(),
                        })?;
                        StrOperand::Regex(pattern)
                    }
                    other => StrOperand::Value(other.boxed()),
                },
                regex @ StrOperand::Regex(_) => regex,
            };
            Expr::StrMatch { op, left, right }
        }
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let expr = fold(*expr, in_match)?;
            let list = match temporal_kind(&expr) {
                Some(kind) => list
                    .into_iter()
                    .map(|lit| temporal_literal(kind, lit))
                    .collect::<Result<Vec<_>, _>>()?,
                None => list,
            };
            Expr::InList {
                expr: expr.boxed(),
                list,
                negated,
            }
        }
        Expr::Quantified { target, quantifier } => {
            let target = fold(*target, in_match)?.boxed();
            let quantifier = match quantifier {
                Quantifier::Have(operand) => {
                    let scoped = in_match || operand.uses_placeholder();
                    Quantifier::Have(fold(*operand, scoped)?.boxed())
                }
                size @ Quantifier::HaveSize { .. } => size,
                Quantifier::Any(body) => Quantifier::Any(fold(*body, true)?.boxed()),
                Quantifier::All(body) => Quantifier::All(fold(*body, true)?.boxed()),
                Quantifier::None(body) => Quantifier::None(fold(*body, true)?.boxed()),
            };
            Expr::Quantified { target, quantifier }
        }
    })
}

fn temporal_kind(expr: &Expr) -> Option<TemporalKind> {
    match expr {
        Expr::Temporal { kind, .. } => Some(*kind),
        _ => None,
    }
}

fn temporal_const(kind: TemporalKind, expr: Expr) -> Result<Expr, CompileError> {
    match expr {
        Expr::Literal(lit) => Ok(Expr::Literal(temporal_literal(kind, lit)?)),
        other => Ok(other),
    }
}

fn temporal_literal(kind: TemporalKind, lit: Literal) -> Result<Literal, CompileError> {
    match lit {
        Literal::Str(text) => match parse_temporal(kind, &text) {
            Some(millis) => Ok(Literal::Temporal { kind, millis }),
            None => Err(CompileError::BadTemporal {
                kind: kind.as_str(),
                literal: text,
            }),
        },
        other => Ok(other),
    }
}
