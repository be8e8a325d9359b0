use winnow::combinator::{alt, cut_err, fail, opt, separated};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{literal, take_while};

use crate::ast::*;
use crate::parse_utils::{ident, kw, nonneg_integer, number_literal, quoted_string, ws_skip};

/// Where an operand sits. A quoted string on the field side is a field path;
/// on the constant side it is a string constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Field,
    Const,
}

// ---------------------------------------------------------------------------
// Public entry: full expression
// ---------------------------------------------------------------------------

pub(crate) fn parse_expr(input: &mut &str) -> ModalResult<Expr> {
    or_expr.parse_next(input)
}

// ---------------------------------------------------------------------------
// Precedence levels (lowest to highest)
// ---------------------------------------------------------------------------

/// `or_expr = and_expr { ("||" | "or") and_expr }`
fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut left = and_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        if opt(alt((literal("||").void(), kw("or"))))
            .parse_next(input)?
            .is_some()
        {
            ws_skip.parse_next(input)?;
            let right = cut_err(and_expr).parse_next(input)?;
            left = Expr::Logic {
                op: LogicOp::Or,
                left: left.boxed(),
                right: right.boxed(),
            };
        } else {
            break;
        }
    }
    Ok(left)
}

/// `and_expr = not_expr { ("&&" | "and") not_expr }`
fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut left = not_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        if opt(alt((literal("&&").void(), kw("and"))))
            .parse_next(input)?
            .is_some()
        {
            ws_skip.parse_next(input)?;
            let right = cut_err(not_expr).parse_next(input)?;
            left = Expr::Logic {
                op: LogicOp::And,
                left: left.boxed(),
                right: right.boxed(),
            };
        } else {
            break;
        }
    }
    Ok(left)
}

/// `not_expr = ("!" | "not") not_expr | cmp_expr`
fn not_expr(input: &mut &str) -> ModalResult<Expr> {
    ws_skip.parse_next(input)?;
    if opt(alt((literal("!").void(), kw("not"))))
        .parse_next(input)?
        .is_some()
    {
        ws_skip.parse_next(input)?;
        let inner = cut_err(not_expr).parse_next(input)?;
        return Ok(Expr::Not(inner.boxed()));
    }
    cmp_expr.parse_next(input)
}

/// ```text
/// cmp_expr = operand [ cmp_op operand
///                    | str_op operand
///                    | ("in" | "=:=" | "not" "in") list
///                    | "have" ("size" cmp_op int | operand)
///                    | ("any" | "all" | "none") "matches" "(" expr ")" ]
/// ```
fn cmp_expr(input: &mut &str) -> ModalResult<Expr> {
    let left = add_expr(input, Side::Field)?;
    ws_skip.parse_next(input)?;

    if opt((kw("not"), ws_skip, kw("in")))
        .parse_next(input)?
        .is_some()
    {
        ws_skip.parse_next(input)?;
        let list = in_list.parse_next(input)?;
        return Ok(Expr::InList {
            expr: left.boxed(),
            list,
            negated: true,
        });
    }

    if opt(alt((kw("in"), literal("=:=").void())))
        .parse_next(input)?
        .is_some()
    {
        ws_skip.parse_next(input)?;
        let list = in_list.parse_next(input)?;
        return Ok(Expr::InList {
            expr: left.boxed(),
            list,
            negated: false,
        });
    }

    if opt(kw("have")).parse_next(input)?.is_some() {
        ws_skip.parse_next(input)?;
        let quantifier = have_tail.parse_next(input)?;
        return Ok(Expr::Quantified {
            target: left.boxed(),
            quantifier,
        });
    }

    if let Some(kind) = opt(alt((
        kw("any").value(MatchKind::Any),
        kw("all").value(MatchKind::All),
        kw("none").value(MatchKind::None),
    )))
    .parse_next(input)?
    {
        ws_skip.parse_next(input)?;
        cut_err(kw("matches"))
            .context(StrContext::Expected(StrContextValue::Description(
                "'matches'",
            )))
            .parse_next(input)?;
        ws_skip.parse_next(input)?;
        let body = cut_err(paren_expr)
            .context(StrContext::Expected(StrContextValue::Description(
                "parenthesized match body",
            )))
            .parse_next(input)?
            .boxed();
        let quantifier = match kind {
            MatchKind::Any => Quantifier::Any(body),
            MatchKind::All => Quantifier::All(body),
            MatchKind::None => Quantifier::None(body),
        };
        return Ok(Expr::Quantified {
            target: left.boxed(),
            quantifier,
        });
    }

    if let Some(op) = opt(str_op).parse_next(input)? {
        ws_skip.parse_next(input)?;
        let right = cut_err(|i: &mut &str| add_expr(i, Side::Const)).parse_next(input)?;
        return Ok(Expr::StrMatch {
            op,
            left: left.boxed(),
            right: StrOperand::Value(right.boxed()),
        });
    }

    if let Some(op) = opt(cmp_op).parse_next(input)? {
        ws_skip.parse_next(input)?;
        let right = cut_err(|i: &mut &str| add_expr(i, Side::Const)).parse_next(input)?;
        return Ok(Expr::Compare {
            op,
            left: left.boxed(),
            right: right.boxed(),
        });
    }

    if input.starts_with("==") || input.starts_with("!=") {
        return cut_err(fail)
            .context(StrContext::Expected(StrContextValue::Description(
                "'===' or '=!=' (plain '==' and '!=' are not operators)",
            )))
            .parse_next(input);
    }

    Ok(left)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    Any,
    All,
    None,
}

fn have_tail(input: &mut &str) -> ModalResult<Quantifier> {
    if opt(kw("size")).parse_next(input)?.is_some() {
        ws_skip.parse_next(input)?;
        let op = cut_err(cmp_op)
            .context(StrContext::Expected(StrContextValue::Description(
                "comparison operator after 'have size'",
            )))
            .parse_next(input)?;
        ws_skip.parse_next(input)?;
        let size = cut_err(nonneg_integer)
            .context(StrContext::Expected(StrContextValue::Description(
                "non-negative integer size",
            )))
            .parse_next(input)?;
        return Ok(Quantifier::HaveSize { op, size });
    }
    let operand = cut_err(|i: &mut &str| add_expr(i, Side::Const))
        .context(StrContext::Expected(StrContextValue::Description(
            "value after 'have'",
        )))
        .parse_next(input)?;
    Ok(Quantifier::Have(operand.boxed()))
}

fn in_list(input: &mut &str) -> ModalResult<Vec<Literal>> {
    cut_err(literal("("))
        .context(StrContext::Expected(StrContextValue::Description(
            "'(' opening the value list",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;
    let list: Vec<Literal> = separated(
        1..,
        (ws_skip, const_literal, ws_skip).map(|(_, l, _)| l),
        literal(","),
    )
    .parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(literal(")"))
        .context(StrContext::Expected(StrContextValue::Description(
            "')' closing the value list",
        )))
        .parse_next(input)?;
    Ok(list)
}

fn str_op(input: &mut &str) -> ModalResult<StrOp> {
    alt((
        literal("#==").value(StrOp::Prefix),
        literal("=@=").value(StrOp::Contains),
        literal("==#").value(StrOp::Suffix),
        literal("=#=").value(StrOp::Regex),
    ))
    .parse_next(input)
}

fn cmp_op(input: &mut &str) -> ModalResult<CmpOp> {
    alt((
        literal("===").value(CmpOp::Eq),
        literal("=!=").value(CmpOp::Ne),
        literal("<=").value(CmpOp::Le),
        literal(">=").value(CmpOp::Ge),
        literal("<").value(CmpOp::Lt),
        literal(">").value(CmpOp::Gt),
    ))
    .parse_next(input)
}

/// `add_expr = mul_expr { ("+" | "-") mul_expr }`
fn add_expr(input: &mut &str, side: Side) -> ModalResult<Expr> {
    let mut left = mul_expr(input, side)?;
    loop {
        ws_skip.parse_next(input)?;
        let op = opt(alt((
            literal("+").value(ArithOp::Add),
            literal("-").value(ArithOp::Sub),
        )))
        .parse_next(input)?;
        if let Some(op) = op {
            ws_skip.parse_next(input)?;
            let right = cut_err(|i: &mut &str| mul_expr(i, side)).parse_next(input)?;
            left = Expr::Arith {
                op,
                left: left.boxed(),
                right: right.boxed(),
            };
        } else {
            break;
        }
    }
    Ok(left)
}

/// `mul_expr = unary_expr { ("*" | "/" | "%") unary_expr }`
fn mul_expr(input: &mut &str, side: Side) -> ModalResult<Expr> {
    let mut left = unary_expr(input, side)?;
    loop {
        ws_skip.parse_next(input)?;
        let op = opt(alt((
            literal("*").value(ArithOp::Mul),
            literal("/").value(ArithOp::Div),
            literal("%").value(ArithOp::Mod),
        )))
        .parse_next(input)?;
        if let Some(op) = op {
            ws_skip.parse_next(input)?;
            let right = cut_err(|i: &mut &str| unary_expr(i, side)).parse_next(input)?;
            left = Expr::Arith {
                op,
                left: left.boxed(),
                right: right.boxed(),
            };
        } else {
            break;
        }
    }
    Ok(left)
}

/// `unary_expr = ["-"] unary_expr | primary`
fn unary_expr(input: &mut &str, side: Side) -> ModalResult<Expr> {
    if opt(literal("-")).parse_next(input)?.is_some() {
        ws_skip.parse_next(input)?;
        let inner = cut_err(|i: &mut &str| unary_expr(i, side)).parse_next(input)?;
        Ok(Expr::Neg(inner.boxed()))
    } else {
        primary(input, side)
    }
}

// ---------------------------------------------------------------------------
// Primary
// ---------------------------------------------------------------------------

fn primary(input: &mut &str, side: Side) -> ModalResult<Expr> {
    alt((
        number_literal.map(Expr::Literal),
        |i: &mut &str| quoted_operand(i, side),
        kw("true").map(|_| Expr::Literal(Literal::Bool(true))),
        kw("false").map(|_| Expr::Literal(Literal::Bool(false))),
        kw("null").map(|_| Expr::Literal(Literal::Null)),
        placeholder,
        paren_expr,
        func_call,
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression",
    )))
    .parse_next(input)
}

fn quoted_operand(input: &mut &str, side: Side) -> ModalResult<Expr> {
    let text = quoted_string.parse_next(input)?;
    match side {
        Side::Const => Ok(Expr::Literal(Literal::Str(text))),
        Side::Field => match FieldPath::parse(&text) {
            Some(path) => Ok(Expr::Field(path)),
            None => cut_err(fail)
                .context(StrContext::Expected(StrContextValue::Description(
                    "non-empty field path",
                )))
                .parse_next(input),
        },
    }
}

/// `?` or `?.a.b`
fn placeholder(input: &mut &str) -> ModalResult<Expr> {
    literal("?").parse_next(input)?;
    if opt(literal(".")).parse_next(input)?.is_none() {
        return Ok(Expr::Placeholder(None));
    }
    let raw = cut_err(take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || c == '_' || c == '.'
    }))
    .context(StrContext::Expected(StrContextValue::Description(
        "path after '?.'",
    )))
    .parse_next(input)?;
    match FieldPath::parse(raw) {
        Some(path) => Ok(Expr::Placeholder(Some(path))),
        None => cut_err(fail)
            .context(StrContext::Expected(StrContextValue::Description(
                "well-formed path after '?.'",
            )))
            .parse_next(input),
    }
}

fn paren_expr(input: &mut &str) -> ModalResult<Expr> {
    literal("(").parse_next(input)?;
    ws_skip.parse_next(input)?;
    let inner = cut_err(parse_expr).parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(literal(")"))
        .context(StrContext::Expected(StrContextValue::Description("')'")))
        .parse_next(input)?;
    Ok(inner)
}

/// `field("p")`, `const(v)`, `exist("p")`, `time("p")`, `date("p")`,
/// `datetime("p")`. Names are case-insensitive.
fn func_call(input: &mut &str) -> ModalResult<Expr> {
    let name = ident.parse_next(input)?.to_ascii_lowercase();
    ws_skip.parse_next(input)?;
    cut_err(literal("("))
        .context(StrContext::Expected(StrContextValue::Description(
            "'(' after function name",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    let expr = match name.as_str() {
        "const" => Expr::Literal(
            cut_err(const_literal)
                .context(StrContext::Expected(StrContextValue::Description(
                    "constant argument",
                )))
                .parse_next(input)?,
        ),
        "field" => Expr::Field(path_arg.parse_next(input)?),
        "exist" => Expr::Exist(path_arg.parse_next(input)?),
        "time" => Expr::Temporal {
            kind: TemporalKind::Time,
            path: path_arg.parse_next(input)?,
        },
        "date" => Expr::Temporal {
            kind: TemporalKind::Date,
            path: path_arg.parse_next(input)?,
        },
        "datetime" => Expr::Temporal {
            kind: TemporalKind::DateTime,
            path: path_arg.parse_next(input)?,
        },
        _ => {
            return cut_err(fail)
                .context(StrContext::Expected(StrContextValue::Description(
                    "function field|const|exist|time|date|datetime",
                )))
                .parse_next(input);
        }
    };

    ws_skip.parse_next(input)?;
    cut_err(literal(")"))
        .context(StrContext::Expected(StrContextValue::Description(
            "')' closing the single function argument",
        )))
        .parse_next(input)?;
    Ok(expr)
}

fn path_arg(input: &mut &str) -> ModalResult<FieldPath> {
    let raw = cut_err(quoted_string)
        .context(StrContext::Expected(StrContextValue::Description(
            "quoted field path argument",
        )))
        .parse_next(input)?;
    match FieldPath::parse(&raw) {
        Some(path) => Ok(path),
        None => cut_err(fail)
            .context(StrContext::Expected(StrContextValue::Description(
                "non-empty field path",
            )))
            .parse_next(input),
    }
}

/// Constant usable in `const(..)` and value lists: number (optionally
/// negative), quoted string, `true`, `false`, `null`.
fn const_literal(input: &mut &str) -> ModalResult<Literal> {
    alt((
        (literal("-"), ws_skip, number_literal).map(|(_, _, lit)| match lit {
            Literal::Int(v) => Literal::Int(-v),
            Literal::Float(v) => Literal::Float(-v),
            other => other,
        }),
        number_literal,
        quoted_string.map(Literal::Str),
        kw("true").map(|_| Literal::Bool(true)),
        kw("false").map(|_| Literal::Bool(false)),
        kw("null").map(|_| Literal::Null),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "constant (number, quoted string, true, false or null)",
    )))
    .parse_next(input)
}
