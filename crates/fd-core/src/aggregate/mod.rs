mod state;
mod timer;

pub use state::AggregateState;
pub use timer::{TimerEntry, TimerIndex};

use std::collections::HashMap;
use std::sync::Arc;

use orion_error::prelude::*;

use crate::alert::{Alert, AlertOrigin, now_rfc3339};
use crate::error::CoreReason;
use crate::eval::{EvalContext, matches};
use crate::router::{KeyTuple, Routed};
use crate::rule::{Rule, RuleId};

#[cfg(test)]
mod tests;

/// Counters describing engine activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub events: u64,
    pub alerts: u64,
    pub windows_closed: u64,
    pub limit_errors: u64,
    pub state_errors: u64,
}

/// Per-rule slot: the definition the states were built under, plus states
/// by key.
#[derive(Debug)]
struct RuleSlot {
    rule: Arc<Rule>,
    keys: HashMap<KeyTuple, AggregateState>,
}

// ---------------------------------------------------------------------------
// AggregationEngine
// ---------------------------------------------------------------------------

/// Keyed aggregate state with one tumbling window per `(rule, key)`,
/// anchored at the key's first event.
///
/// Time only moves through [`process`](Self::process) (event time) and
/// [`advance_to`](Self::advance_to) (explicit tick). Due timers always fire
/// before the event that moved time past them is aggregated.
#[derive(Debug, Default)]
pub struct AggregationEngine {
    rules: HashMap<RuleId, RuleSlot>,
    timers: TimerIndex,
    stats: EngineStats,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Aggregate one routed event and check the rule's limit.
    ///
    /// Returns window-close alerts for timers that came due, followed by the
    /// alert for this event, if any.
    pub fn process(&mut self, routed: Routed) -> Vec<Alert> {
        let Routed { rule, key, event } = routed;
        let now = event.timestamp();
        let mut alerts = self.advance_to(now);
        self.stats.events += 1;

        let stored = if rule.pruning.enabled {
            Arc::new(event.pruned(&rule.pruning.keep))
        } else {
            Arc::clone(&event)
        };

        let slot = self.rules.entry(rule.id).or_insert_with(|| RuleSlot {
            rule: Arc::clone(&rule),
            keys: HashMap::new(),
        });
        if !Arc::ptr_eq(&slot.rule, &rule) {
            slot.rule = Arc::clone(&rule);
        }
        let state = slot
            .keys
            .entry(key.clone())
            .or_insert_with(|| AggregateState::new(&rule.aggregations, now));

        if state.deadline.is_none() {
            match state.window_start().checked_add(rule.window_ms) {
                Some(wake) => {
                    self.timers.arm(wake, rule.id, key.clone());
                    state.deadline = Some(wake);
                }
                None => {
                    self.stats.state_errors += 1;
                    let err = StructError::from(CoreReason::State).with_detail(format!(
                        "rule {}: window deadline overflows for key {}",
                        rule.id,
                        key.as_str()
                    ));
                    log::warn!("{err}");
                }
            }
        }

        state.update(&rule.aggregations, &event, Arc::clone(&stored));
        let aggregates = state.snapshot(&rule);
        let hit = match matches(&rule.limit, &EvalContext::with_aggregates(&event, &aggregates)) {
            Ok(hit) => hit,
            Err(e) => {
                self.stats.limit_errors += 1;
                log::warn!("rule {}: limit evaluation failed: {e}", rule.id);
                false
            }
        };
        state.alerted = hit;

        if hit {
            self.stats.alerts += 1;
            alerts.push(Alert {
                rule_id: rule.id,
                key: key.named(&rule.grouping_keys),
                aggregates,
                event: Arc::clone(&event),
                event_time: now,
                emitted_at: now_rfc3339(),
                origin: AlertOrigin::Event,
            });
        }

        if hit && rule.resets_on_count() {
            if let Some(state) = slot.keys.remove(&key)
                && let Some(wake) = state.deadline
            {
                self.timers.cancel(wake, rule.id, &key);
            }
            if slot.keys.is_empty() {
                self.rules.remove(&rule.id);
            }
        }
        alerts
    }

    /// Fire every timer with `wake <= now`: evaluate the remaining state and
    /// drop it. A window-close alert is emitted only when the limit holds and
    /// the key's last event did not already alert.
    pub fn advance_to(&mut self, now: i64) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for (wake, rule_id, key) in self.timers.pop_due(now) {
            let Some(slot) = self.rules.get_mut(&rule_id) else {
                continue;
            };
            let Some(state) = slot.keys.remove(&key) else {
                continue;
            };
            let rule = Arc::clone(&slot.rule);
            if slot.keys.is_empty() {
                self.rules.remove(&rule_id);
            }
            self.stats.windows_closed += 1;
            log::debug!("rule {rule_id}: window closed for key {}", key.as_str());

            if let Some(alert) = self.close_window(&rule, &key, &state, wake) {
                self.stats.alerts += 1;
                alerts.push(alert);
            }
        }
        alerts
    }

    fn close_window(
        &mut self,
        rule: &Rule,
        key: &KeyTuple,
        state: &AggregateState,
        wake: i64,
    ) -> Option<Alert> {
        if state.alerted {
            return None;
        }
        let event = state.last_event()?;
        let aggregates = state.snapshot(rule);
        match matches(&rule.limit, &EvalContext::with_aggregates(event, &aggregates)) {
            Ok(true) => Some(Alert {
                rule_id: rule.id,
                key: key.named(&rule.grouping_keys),
                aggregates,
                event: Arc::clone(event),
                event_time: wake,
                emitted_at: now_rfc3339(),
                origin: AlertOrigin::WindowClose,
            }),
            Ok(false) => None,
            Err(e) => {
                self.stats.limit_errors += 1;
                log::warn!("rule {}: limit evaluation at window close failed: {e}", rule.id);
                None
            }
        }
    }

    /// Drop all state and timers of one rule.
    pub fn drop_rule(&mut self, rule_id: RuleId) {
        self.timers.cancel_rule(rule_id);
        self.rules.remove(&rule_id);
    }

    /// Cancel the rule's timers; its state is kept for a later resume.
    pub fn suspend_rule(&mut self, rule_id: RuleId) {
        self.timers.cancel_rule(rule_id);
    }

    /// Re-arm the rule's retained windows at their original deadlines.
    pub fn resume_rule(&mut self, rule: &Arc<Rule>) {
        let Some(slot) = self.rules.get_mut(&rule.id) else {
            return;
        };
        slot.rule = Arc::clone(rule);
        for (key, state) in &slot.keys {
            if let Some(wake) = state.deadline {
                self.timers.arm(wake, rule.id, key.clone());
            }
        }
    }

    /// Drop every state and timer; rule definitions live in the store.
    pub fn clear_all(&mut self) {
        self.rules.clear();
        self.timers.clear();
    }

    pub fn state_of(&self, rule_id: RuleId, key: &KeyTuple) -> Option<&AggregateState> {
        self.rules.get(&rule_id)?.keys.get(key)
    }

    /// Keys currently holding state, across all rules.
    pub fn key_count(&self) -> usize {
        self.rules.values().map(|s| s.keys.len()).sum()
    }

    pub fn rule_key_count(&self, rule_id: RuleId) -> usize {
        self.rules.get(&rule_id).map_or(0, |s| s.keys.len())
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_wake(&self) -> Option<i64> {
        self.timers.next_wake()
    }
}
