use std::collections::BTreeSet;

use crate::router::KeyTuple;
use crate::rule::RuleId;

/// One armed window deadline.
pub type TimerEntry = (i64, RuleId, KeyTuple);

/// Wake-time index over `(rule, key)` windows, ordered by deadline then by
/// rule id and key so firing order is deterministic.
#[derive(Debug, Default, Clone)]
pub struct TimerIndex {
    entries: BTreeSet<TimerEntry>,
}

impl TimerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, wake_ms: i64, rule_id: RuleId, key: KeyTuple) {
        self.entries.insert((wake_ms, rule_id, key));
    }

    /// Returns true when the entry was armed.
    pub fn cancel(&mut self, wake_ms: i64, rule_id: RuleId, key: &KeyTuple) -> bool {
        self.entries.remove(&(wake_ms, rule_id, key.clone()))
    }

    /// Drop every timer owned by `rule_id`; returns how many were removed.
    pub fn cancel_rule(&mut self, rule_id: RuleId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, id, _)| *id != rule_id);
        before - self.entries.len()
    }

    /// Remove and return all entries with `wake <= now`, earliest first.
    pub fn pop_due(&mut self, now_ms: i64) -> Vec<TimerEntry> {
        let mut due = Vec::new();
        while self
            .entries
            .first()
            .is_some_and(|(wake, _, _)| *wake <= now_ms)
        {
            if let Some(entry) = self.entries.pop_first() {
                due.push(entry);
            }
        }
        due
    }

    pub fn next_wake(&self) -> Option<i64> {
        self.entries.first().map(|(wake, _, _)| *wake)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
