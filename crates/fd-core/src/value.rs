use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use fd_lang::ast::{Literal, TemporalKind};
use fd_lang::temporal;
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// Closed value model shared by events, aggregates and the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Temporal { kind: TemporalKind, millis: i64 },
    Array(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Temporal values render as their millisecond number; non-finite floats
    /// render as null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Temporal { millis, .. } => serde_json::Value::from(*millis),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Temporal { kind, .. } => kind.as_str(),
            Value::Array(_) => "sequence",
            Value::Record(_) => "record",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Temporal { kind, millis } => Value::Temporal {
                kind: *kind,
                millis: *millis,
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// Numeric view used by comparisons and arithmetic: numbers as-is, strings
/// when they parse as a number.
pub fn coerce_number(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Str(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Bring two values onto a common millisecond scale when at least one of them
/// is temporal. `Time` only pairs with `Time`; `Date` and `DateTime` share the
/// epoch scale.
fn temporal_pair(a: &Value, b: &Value) -> Option<(i64, i64)> {
    fn other_side(kind: TemporalKind, v: &Value) -> Option<i64> {
        match v {
            Value::Temporal { kind: k, millis } => {
                let compatible = *k == kind
                    || (kind != TemporalKind::Time && *k != TemporalKind::Time);
                compatible.then_some(*millis)
            }
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Str(s) => temporal::parse_temporal(kind, s),
            _ => None,
        }
    }
    match (a, b) {
        (Value::Temporal { kind, millis }, other) => Some((*millis, other_side(*kind, other)?)),
        (other, Value::Temporal { kind, millis }) => Some((other_side(*kind, other)?, *millis)),
        _ => None,
    }
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Float(_))
}

/// Equality with the shared coercion rules. Mismatched types are unequal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Temporal { .. }, _) | (_, Value::Temporal { .. }) => {
            temporal_pair(a, b).is_some_and(|(x, y)| x == y)
        }
        _ if is_numeric(a) || is_numeric(b) => match (coerce_number(a), coerce_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        _ => a == b,
    }
}

/// Ordering with the shared coercion rules; `None` when the pair is not
/// ordered (e.g. a boolean against a number).
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Temporal { .. }, _) | (_, Value::Temporal { .. }) => {
            temporal_pair(a, b).map(|(x, y)| x.cmp(&y))
        }
        _ if is_numeric(a) || is_numeric(b) => {
            coerce_number(a)?.partial_cmp(&coerce_number(b)?)
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
