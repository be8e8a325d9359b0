use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::eval::Aggregates;
use crate::event::Event;
use crate::rule::{RuleId, RuleRecord};
use crate::value::Value;

/// Which path produced this alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOrigin {
    /// The limit held right after an event was aggregated.
    Event,
    /// The limit held when the key's window timer fired.
    WindowClose,
}

impl AlertOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertOrigin::Event => "event",
            AlertOrigin::WindowClose => "window_close",
        }
    }
}

impl fmt::Display for AlertOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AlertOrigin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Emitted when a rule's limit holds for a key. Never deduplicated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub rule_id: RuleId,
    /// Grouping-key path → value, in grouping-key order.
    #[serde(serialize_with = "serialize_pairs")]
    pub key: Vec<(String, Value)>,
    pub aggregates: Aggregates,
    /// The triggering event as received. Window-close alerts carry the key's
    /// last stored event instead, pruned as it was kept in state.
    #[serde(serialize_with = "serialize_event")]
    pub event: Arc<Event>,
    /// Event time (or timer deadline for window-close alerts), epoch ms.
    pub event_time: i64,
    /// Wall-clock emission time, RFC 3339 UTC.
    pub emitted_at: String,
    pub origin: AlertOrigin,
}

impl Alert {
    pub fn key_value(&self, name: &str) -> Option<&Value> {
        self.key.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn aggregate(&self, name: &str) -> Option<&Value> {
        self.aggregates.get(name)
    }
}

fn serialize_pairs<S: Serializer>(pairs: &[(String, Value)], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (k, v) in pairs {
        map.serialize_entry(k, v)?;
    }
    map.end()
}

fn serialize_event<S: Serializer>(event: &Arc<Event>, serializer: S) -> Result<S::Ok, S::Error> {
    event.as_ref().serialize(serializer)
}

/// Snapshot of the rule table produced by `EXPORT_RULES_CURRENT`. Serialized
/// as a plain array of rule records, re-ingestible as mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleExport {
    pub rules: Vec<RuleRecord>,
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
