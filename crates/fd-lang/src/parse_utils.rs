use winnow::ascii::{Caseless, multispace0};
use winnow::combinator::{cut_err, opt};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, literal, take_while};

use crate::ast::Literal;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

pub fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    if !input.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Double- or single-quoted string. `\"`, `\'` and `\\` are unescaped; any
/// other backslash sequence is kept verbatim so regex sources survive intact.
pub fn quoted_string(input: &mut &str) -> ModalResult<String> {
    let quote = if input.starts_with('"') {
        '"'
    } else if input.starts_with('\'') {
        '\''
    } else {
        return Err(ErrMode::Backtrack(ContextError::new()));
    };
    any.parse_next(input)?;

    let mut out = String::new();
    loop {
        let c: Option<char> = opt(any).parse_next(input)?;
        match c {
            Some(c) if c == quote => return Ok(out),
            Some('\\') => {
                let next: Option<char> = opt(any).parse_next(input)?;
                match next {
                    Some(n) if n == quote || n == '\\' => out.push(n),
                    Some(n) => {
                        out.push('\\');
                        out.push(n);
                    }
                    None => break,
                }
            }
            Some(c) => out.push(c),
            None => break,
        }
    }
    cut_err(literal(quote))
        .context(StrContext::Expected(StrContextValue::CharLiteral(quote)))
        .parse_next(input)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Whitespace
// ---------------------------------------------------------------------------

/// Skip whitespace. `#` is an operator character in this language, so there
/// are no line comments.
pub fn ws_skip(input: &mut &str) -> ModalResult<()> {
    multispace0.parse_next(input)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Keyword matching with word boundary
// ---------------------------------------------------------------------------

/// Match a keyword case-insensitively, ensuring it's not a prefix of a longer
/// identifier.
pub fn kw<'a>(keyword: &'static str) -> impl FnMut(&mut &'a str) -> ModalResult<()> {
    move |input: &mut &'a str| {
        let saved = *input;
        literal(Caseless(keyword)).parse_next(input)?;
        if input.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
            *input = saved;
            return Err(ErrMode::Backtrack(ContextError::new()));
        }
        Ok(())
    }
}

/// Parse a non-negative integer literal (digits only, no decimal point).
pub fn nonneg_integer(input: &mut &str) -> ModalResult<i64> {
    let saved = *input;
    let digits = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    if input.starts_with('.') {
        *input = saved;
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    digits.parse::<i64>().map_err(|_| {
        *input = saved;
        ErrMode::Backtrack(ContextError::new())
    })
}

// ---------------------------------------------------------------------------
// Number literal
// ---------------------------------------------------------------------------

/// Integer (`Literal::Int`) or decimal (`Literal::Float`) literal.
pub fn number_literal(input: &mut &str) -> ModalResult<Literal> {
    let integer_part = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let has_dot = opt(literal(".")).parse_next(input)?.is_some();
    if has_dot {
        let frac_part = cut_err(take_while(1.., |c: char| c.is_ascii_digit()))
            .context(StrContext::Expected(StrContextValue::Description(
                "digits after decimal point",
            )))
            .parse_next(input)?;
        let s = format!("{integer_part}.{frac_part}");
        let v: f64 = s.parse().map_err(|_| ErrMode::Cut(ContextError::new()))?;
        Ok(Literal::Float(v))
    } else {
        match integer_part.parse::<i64>() {
            Ok(v) => Ok(Literal::Int(v)),
            // Out of i64 range: keep the magnitude as a float.
            Err(_) => integer_part
                .parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| ErrMode::Cut(ContextError::new())),
        }
    }
}
