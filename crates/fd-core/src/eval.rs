use std::collections::BTreeMap;

use fd_lang::ast::*;
use fd_lang::temporal;

use crate::event::{Event, resolve_path};
use crate::value::{Value, coerce_number, compare_values, values_equal};


/// Aggregate values by declared name, as seen by a rule's `limit`.
pub type Aggregates = BTreeMap<String, Value>;

/// Evaluation-time failures. Each aborts a single expression for a single
/// event; callers treat the rule as not matching.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("type error: '{op}' cannot be applied to {found}")]
    Type { op: &'static str, found: String },
    #[error("division by zero")]
    DivideByZero,
    #[error("expected a boolean, found {found}")]
    NotBoolean { found: String },
    #[error("invalid regex '{pattern}': {reason}")]
    Regex { pattern: String, reason: String },
}

type EvalResult = Result<Option<Value>, EvalError>;

/// What an expression is evaluated against.
///
/// `aggregates` is present only for `limit`; aggregate names then shadow
/// event fields. `element` is the value bound to `?` inside a quantifier body.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub event: &'a Event,
    pub aggregates: Option<&'a Aggregates>,
    pub element: Option<&'a Value>,
}

impl<'a> EvalContext<'a> {
    pub fn event(event: &'a Event) -> Self {
        Self {
            event,
            aggregates: None,
            element: None,
        }
    }

    pub fn with_aggregates(event: &'a Event, aggregates: &'a Aggregates) -> Self {
        Self {
            event,
            aggregates: Some(aggregates),
            element: None,
        }
    }

    fn bind<'b>(&self, element: &'b Value) -> EvalContext<'b>
    where
        'a: 'b,
    {
        EvalContext {
            event: self.event,
            aggregates: self.aggregates,
            element: Some(element),
        }
    }

    /// Aggregates first (limit only), then the bound element, then the event.
    fn resolve(&self, path: &FieldPath) -> Option<Value> {
        if let Some(v) = self.aggregates.and_then(|a| a.get(path.as_str())) {
            return Some(v.clone());
        }
        if let Some(v) = self.element.and_then(|e| resolve_path(e, path.segments())) {
            return Some(v.clone());
        }
        self.event.resolve(path).cloned()
    }

    fn exists(&self, path: &FieldPath) -> bool {
        self.aggregates.is_some_and(|a| a.contains_key(path.as_str()))
            || self
                .element
                .is_some_and(|e| resolve_path(e, path.segments()).is_some())
            || self.event.resolve(path).is_some()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Evaluate a predicate. Unresolved and null results count as `false`.
pub fn matches(expr: &CompiledExpr, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
    truth(evaluate(expr.expr(), ctx)?)
}

/// Evaluate an expression to a value; `Ok(None)` means it did not resolve.
pub fn evaluate(expr: &Expr, ctx: &EvalContext<'_>) -> EvalResult {
    match expr {
        Expr::Literal(lit) => Ok(Some(Value::from(lit))),
        Expr::Field(path) => Ok(ctx.resolve(path)),
        Expr::Placeholder(path) => Ok(match (ctx.element, path) {
            (Some(e), None) => Some(e.clone()),
            (Some(e), Some(p)) => resolve_path(e, p.segments()).cloned(),
            (None, _) => None,
        }),
        Expr::Exist(path) => Ok(Some(Value::Bool(ctx.exists(path)))),
        Expr::Temporal { kind, path } => match ctx.resolve(path) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => to_temporal(*kind, &v).map(Some),
        },
        Expr::Not(inner) => match evaluate(inner, ctx)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(Value::Bool(!b))),
            Some(other) => Err(EvalError::NotBoolean {
                found: other.type_name().to_string(),
            }),
        },
        Expr::Neg(inner) => match evaluate(inner, ctx)? {
            None => Ok(None),
            Some(Value::Int(i)) => Ok(Some(
                i.checked_neg()
                    .map(Value::Int)
                    .unwrap_or(Value::Float(-(i as f64))),
            )),
            Some(Value::Float(f)) => Ok(Some(Value::Float(-f))),
            Some(other) => match coerce_number(&other) {
                Some(n) => Ok(Some(Value::Float(-n))),
                None => Err(type_error("-", &other)),
            },
        },
        Expr::Logic { op, left, right } => eval_logic(*op, left, right, ctx),
        Expr::Arith { op, left, right } => {
            let (Some(l), Some(r)) = (evaluate(left, ctx)?, evaluate(right, ctx)?) else {
                return Ok(None);
            };
            eval_arith(*op, &l, &r).map(Some)
        }
        Expr::Compare { op, left, right } => {
            let (Some(l), Some(r)) = (evaluate(left, ctx)?, evaluate(right, ctx)?) else {
                return Ok(Some(Value::Bool(false)));
            };
            eval_compare(*op, &l, &r).map(|b| Some(Value::Bool(b)))
        }
        Expr::StrMatch { op, left, right } => eval_str_match(*op, left, right, ctx),
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let found = match evaluate(expr, ctx)? {
                Some(v) => list.iter().any(|lit| values_equal(&v, &Value::from(lit))),
                None => false,
            };
            Ok(Some(Value::Bool(found != *negated)))
        }
        Expr::Quantified { target, quantifier } => eval_quantified(target, quantifier, ctx),
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn truth(v: Option<Value>) -> Result<bool, EvalError> {
    match v {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(other) => Err(EvalError::NotBoolean {
            found: other.type_name().to_string(),
        }),
    }
}

fn type_error(op: &'static str, found: &Value) -> EvalError {
    EvalError::Type {
        op,
        found: found.type_name().to_string(),
    }
}

/// Three-valued logic: `false && unresolved` is false, `true || unresolved`
/// is true, anything else involving an unresolved side stays unresolved.
fn eval_logic(op: LogicOp, left: &Expr, right: &Expr, ctx: &EvalContext<'_>) -> EvalResult {
    let short = matches!(op, LogicOp::Or);
    let l = tri(evaluate(left, ctx)?)?;
    if l == Some(short) {
        return Ok(Some(Value::Bool(short)));
    }
    let r = tri(evaluate(right, ctx)?)?;
    Ok(match (l, r) {
        (_, Some(b)) if b == short => Some(Value::Bool(short)),
        (Some(_), Some(_)) => Some(Value::Bool(!short)),
        _ => None,
    })
}

fn tri(v: Option<Value>) -> Result<Option<bool>, EvalError> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(other) => Err(EvalError::NotBoolean {
            found: other.type_name().to_string(),
        }),
    }
}

fn eval_compare(op: CmpOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    match op {
        CmpOp::Eq => Ok(values_equal(l, r)),
        CmpOp::Ne => Ok(!values_equal(l, r)),
        _ if l.is_null() || r.is_null() => Ok(false),
        _ => {
            let ord = compare_values(l, r).ok_or_else(|| EvalError::Type {
                op: op.as_str(),
                found: format!("{} and {}", l.type_name(), r.type_name()),
            })?;
            Ok(match op {
                CmpOp::Lt => ord.is_lt(),
                CmpOp::Le => ord.is_le(),
                CmpOp::Gt => ord.is_gt(),
                CmpOp::Ge => ord.is_ge(),
                CmpOp::Eq => ord.is_eq(),
                CmpOp::Ne => ord.is_ne(),
            })
        }
    }
}

fn arith_symbol(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
        ArithOp::Div => "/",
        ArithOp::Mod => "%",
    }
}

fn eval_arith(op: ArithOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    // Temporal differences and offsets stay on the millisecond scale.
    match (l, r, op) {
        (
            Value::Temporal { kind: lk, millis: a },
            Value::Temporal { kind: rk, millis: b },
            ArithOp::Sub,
        ) if lk == rk => return Ok(Value::Int(a.saturating_sub(*b))),
        (Value::Temporal { kind, millis }, Value::Int(d), ArithOp::Add | ArithOp::Sub) => {
            let millis = if op == ArithOp::Add {
                millis.saturating_add(*d)
            } else {
                millis.saturating_sub(*d)
            };
            return Ok(Value::Temporal {
                kind: *kind,
                millis,
            });
        }
        _ => {}
    }

    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        let exact = match op {
            ArithOp::Add => a.checked_add(*b),
            ArithOp::Sub => a.checked_sub(*b),
            ArithOp::Mul => a.checked_mul(*b),
            ArithOp::Mod if *b == 0 => return Err(EvalError::DivideByZero),
            ArithOp::Mod => a.checked_rem(*b),
            ArithOp::Div => None,
        };
        if let Some(v) = exact {
            return Ok(Value::Int(v));
        }
    }

    let a = coerce_number(l).ok_or_else(|| type_error(arith_symbol(op), l))?;
    let b = coerce_number(r).ok_or_else(|| type_error(arith_symbol(op), r))?;
    match op {
        ArithOp::Add => Ok(Value::Float(a + b)),
        ArithOp::Sub => Ok(Value::Float(a - b)),
        ArithOp::Mul => Ok(Value::Float(a * b)),
        ArithOp::Div | ArithOp::Mod if b == 0.0 => Err(EvalError::DivideByZero),
        ArithOp::Div => Ok(Value::Float(a / b)),
        ArithOp::Mod => Ok(Value::Float(a % b)),
    }
}

fn eval_str_match(
    op: StrOp,
    left: &Expr,
    right: &StrOperand,
    ctx: &EvalContext<'_>,
) -> EvalResult {
    let subject = match evaluate(left, ctx)? {
        None => return Ok(Some(Value::Bool(false))),
        Some(Value::Str(s)) => s,
        Some(other) => return Err(type_error(op.as_str(), &other)),
    };
    let hit = match right {
        StrOperand::Regex(pattern) => pattern.is_match(&subject),
        StrOperand::Value(expr) => {
            let needle = match evaluate(expr, ctx)? {
                None => return Ok(Some(Value::Bool(false))),
                Some(Value::Str(s)) => s,
                Some(other) => return Err(type_error(op.as_str(), &other)),
            };
            match op {
                StrOp::Prefix => subject.starts_with(&needle),
                StrOp::Contains => subject.contains(&needle),
                StrOp::Suffix => subject.ends_with(&needle),
                StrOp::Regex => Pattern::new(&needle)
                    .map_err(|e| EvalError::Regex {
                        pattern: needle.clone(),
                        reason: e.to_string(),
                    })?
                    .is_match(&subject),
            }
        }
    };
    Ok(Some(Value::Bool(hit)))
}

fn to_temporal(kind: TemporalKind, v: &Value) -> Result<Value, EvalError> {
    let millis = match v {
        Value::Int(i) => temporal::from_epoch_millis(kind, *i),
        Value::Float(f) if f.is_finite() => temporal::from_epoch_millis(kind, *f as i64),
        Value::Str(s) => temporal::parse_temporal(kind, s)
            .or_else(|| {
                s.trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|ms| temporal::from_epoch_millis(kind, ms))
            }),
        Value::Temporal { kind: k, millis } if *k == kind => Some(*millis),
        Value::Temporal {
            kind: TemporalKind::Date | TemporalKind::DateTime,
            millis,
        } => temporal::from_epoch_millis(kind, *millis),
        _ => None,
    };
    millis
        .map(|millis| Value::Temporal { kind, millis })
        .ok_or_else(|| EvalError::Type {
            op: kind.as_str(),
            found: format!("{} {v}", v.type_name()),
        })
}

// ---------------------------------------------------------------------------
// Quantifiers
// ---------------------------------------------------------------------------

/// Members of a quantified target: sequence items, record values (keys are
/// not named), or the scalar itself.
fn members(v: &Value) -> Vec<&Value> {
    match v {
        Value::Array(items) => items.iter().collect(),
        Value::Record(map) => map.values().collect(),
        other => vec![other],
    }
}

fn eval_quantified(target: &Expr, quantifier: &Quantifier, ctx: &EvalContext<'_>) -> EvalResult {
    let Some(collection) = evaluate(target, ctx)? else {
        return Ok(Some(Value::Bool(false)));
    };
    if collection.is_null() {
        return Ok(Some(Value::Bool(false)));
    }

    let result = match quantifier {
        Quantifier::HaveSize { op, size } => {
            let len = match &collection {
                Value::Array(items) => items.len(),
                Value::Record(map) => map.len(),
                Value::Str(s) => s.chars().count(),
                other => return Err(type_error("have size", other)),
            };
            eval_compare(*op, &Value::Int(len as i64), &Value::Int(*size))?
        }
        Quantifier::Have(operand) if operand.uses_placeholder() => {
            any_member(&collection, operand, ctx)?
        }
        Quantifier::Have(operand) => match evaluate(operand, ctx)? {
            None => false,
            Some(needle) => match &collection {
                Value::Record(map) => {
                    needle.as_str().is_some_and(|k| map.contains_key(k))
                        || map.values().any(|v| values_equal(v, &needle))
                }
                other => members(other).into_iter().any(|m| values_equal(m, &needle)),
            },
        },
        Quantifier::Any(body) => any_member(&collection, body, ctx)?,
        Quantifier::All(body) => {
            let mut all = true;
            for m in members(&collection) {
                if !truth(evaluate(body, &ctx.bind(m))?)? {
                    all = false;
                    break;
                }
            }
            all
        }
        Quantifier::None(body) => !any_member(&collection, body, ctx)?,
    };
    Ok(Some(Value::Bool(result)))
}

fn any_member(collection: &Value, body: &Expr, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
    for m in members(collection) {
        if truth(evaluate(body, &ctx.bind(m))?)? {
            return Ok(true);
        }
    }
    Ok(false)
}
