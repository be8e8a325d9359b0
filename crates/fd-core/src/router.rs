use std::cmp::Ordering;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use fd_lang::ast::FieldPath;

use crate::eval::{EvalContext, matches};
use crate::event::Event;
use crate::rule::{Rule, RuleId};
use crate::store::RuleSnapshot;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Key tuple
// ---------------------------------------------------------------------------

/// Ordered grouping-key values extracted for one rule.
///
/// Identity is the canonical form: each value's JSON text joined by `\x1f`,
/// so `"1"` and `1` are different keys.
#[derive(Debug, Clone)]
pub struct KeyTuple {
    values: Vec<Value>,
    canonical: String,
}

impl KeyTuple {
    pub fn new(values: Vec<Value>) -> Self {
        let canonical = values
            .iter()
            .map(|v| v.to_json().to_string())
            .collect::<Vec<_>>()
            .join("\x1f");
        Self { values, canonical }
    }

    /// Extract `keys` from `event`; `None` when any key path is missing.
    pub fn extract(event: &Event, keys: &[FieldPath]) -> Option<Self> {
        let values = keys
            .iter()
            .map(|k| event.resolve(k).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(Self::new(values))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// `(key path, value)` pairs in grouping-key order.
    pub fn named(&self, keys: &[FieldPath]) -> Vec<(String, Value)> {
        keys.iter()
            .map(|k| k.as_str().to_string())
            .zip(self.values.iter().cloned())
            .collect()
    }
}

impl PartialEq for KeyTuple {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for KeyTuple {}

impl Hash for KeyTuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for KeyTuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyTuple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

/// Worker partition owning `(rule_id, key)`.
pub fn partition_of(rule_id: RuleId, key: &KeyTuple, partitions: usize) -> usize {
    if partitions <= 1 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    rule_id.hash(&mut hasher);
    key.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as usize
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// One event bound to one rule and its key.
#[derive(Debug, Clone)]
pub struct Routed {
    pub rule: Arc<Rule>,
    pub key: KeyTuple,
    pub event: Arc<Event>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub events: u64,
    pub routed: u64,
    pub filter_errors: u64,
    pub missing_keys: u64,
}

/// Decides, per event, which active rules apply and under which key.
#[derive(Debug, Default)]
pub struct Router {
    stats: RouterStats,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Active rules in id order whose filter holds and whose grouping keys
    /// all resolve. A filter evaluation error skips the rule for this event.
    pub fn route(&mut self, rules: &RuleSnapshot, event: &Arc<Event>) -> Vec<Routed> {
        self.stats.events += 1;
        let ctx = EvalContext::event(event);
        let mut out = Vec::new();
        for rule in rules.values().filter(|r| r.is_active()) {
            match matches(&rule.filter, &ctx) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    self.stats.filter_errors += 1;
                    log::warn!("rule {}: filter evaluation failed: {e}", rule.id);
                    continue;
                }
            }
            let Some(key) = KeyTuple::extract(event, &rule.grouping_keys) else {
                self.stats.missing_keys += 1;
                log::debug!("rule {}: event lacks a grouping key", rule.id);
                continue;
            };
            out.push(Routed {
                rule: Arc::clone(rule),
                key,
                event: Arc::clone(event),
            });
        }
        self.stats.routed += out.len() as u64;
        out
    }
}
