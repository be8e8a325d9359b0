use std::collections::BTreeMap;

use fd_lang::ast::{FieldPath, TemporalKind};
use fd_lang::temporal;
use orion_error::prelude::*;
use serde::{Serialize, Serializer};

use crate::error::{CoreReason, CoreResult};
use crate::value::Value;

/// A decoded event: a nested record plus its timestamp in epoch milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    body: BTreeMap<String, Value>,
    timestamp: i64,
}

impl Event {
    pub fn new(body: BTreeMap<String, Value>, timestamp: i64) -> Self {
        Self { body, timestamp }
    }

    /// Decode a JSON object, taking the timestamp from `timestamp_field`
    /// (a dotted path). The timestamp may be epoch milliseconds or a datetime
    /// string.
    pub fn from_json(json: &serde_json::Value, timestamp_field: &str) -> CoreResult<Event> {
        let body = match Value::from_json(json) {
            Value::Record(map) => map,
            other => {
                return StructError::from(CoreReason::DataFormat)
                    .with_detail(format!("event must be a JSON object, got {}", other.type_name()))
                    .err();
            }
        };
        let Some(path) = FieldPath::parse(timestamp_field) else {
            return StructError::from(CoreReason::DataFormat)
                .with_detail("empty timestamp field name")
                .err();
        };
        let timestamp = match resolve_in(&body, path.segments()) {
            Some(v) => timestamp_millis(v).ok_or_else(|| {
                StructError::from(CoreReason::DataFormat).with_detail(format!(
                    "timestamp field '{timestamp_field}' is not a timestamp: {v}"
                ))
            })?,
            None => {
                return StructError::from(CoreReason::DataFormat)
                    .with_detail(format!("missing timestamp field '{timestamp_field}'"))
                    .err();
            }
        };
        Ok(Event { body, timestamp })
    }

    pub fn from_json_str(text: &str, timestamp_field: &str) -> CoreResult<Event> {
        let json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            StructError::from(CoreReason::DataFormat).with_detail(format!("invalid event JSON: {e}"))
        })?;
        Event::from_json(&json, timestamp_field)
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn body(&self) -> &BTreeMap<String, Value> {
        &self.body
    }

    /// `None` means the path does not exist; a present null is `Some(Value::Null)`.
    pub fn resolve(&self, path: &FieldPath) -> Option<&Value> {
        resolve_in(&self.body, path.segments())
    }

    /// Copy of this event holding only the given paths. The timestamp is kept.
    pub fn pruned(&self, keep: &[FieldPath]) -> Event {
        let mut body = BTreeMap::new();
        for path in keep {
            graft(&self.body, path.segments(), &mut body);
        }
        Event {
            body,
            timestamp: self.timestamp,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.body
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn resolve_in<'a>(root: &'a BTreeMap<String, Value>, segments: &[String]) -> Option<&'a Value> {
    let (head, rest) = segments.split_first()?;
    resolve_path(root.get(head)?, rest)
}

/// Descend `segments` from `value`: records by key, sequences by numeric index.
pub fn resolve_path<'a>(value: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = value;
    for seg in segments {
        current = match current {
            Value::Record(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Copy the value at `segments` from `src` into `dst`, creating intermediate
/// records. Sequences on the way are copied whole.
fn graft(src: &BTreeMap<String, Value>, segments: &[String], dst: &mut BTreeMap<String, Value>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = src.get(head) else {
        return;
    };
    match value {
        Value::Record(inner) if !rest.is_empty() => {
            let slot = dst
                .entry(head.clone())
                .or_insert_with(|| Value::Record(BTreeMap::new()));
            if let Value::Record(slot) = slot {
                graft(inner, rest, slot);
            }
        }
        _ => {
            dst.insert(head.clone(), value.clone());
        }
    }
}

fn timestamp_millis(v: &Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.is_finite() => Some(*f as i64),
        Value::Temporal { millis, .. } => Some(*millis),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| temporal::parse_temporal(TemporalKind::DateTime, s)),
        _ => None,
    }
}
