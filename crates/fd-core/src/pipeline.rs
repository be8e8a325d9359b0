use std::sync::Arc;

use orion_error::prelude::*;

use crate::aggregate::AggregationEngine;
use crate::alert::{Alert, RuleExport};
use crate::error::{CoreReason, CoreResult};
use crate::event::Event;
use crate::router::{Routed, Router, RouterStats};
use crate::rule::{DEFAULT_WINDOW_MS, Rule, RuleRecord};
use crate::store::{RuleStore, StoreEffect};

/// Store, router and aggregation engine for one partition.
///
/// Every effect of a rule mutation is mirrored onto the engine before the
/// next event is processed.
#[derive(Debug)]
pub struct Pipeline {
    store: RuleStore,
    router: Router,
    engine: AggregationEngine,
    timestamp_field: String,
    dropped_halted: u64,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS, "timestamp")
    }
}

impl Pipeline {
    pub fn new(default_window_ms: i64, timestamp_field: impl Into<String>) -> Self {
        Self {
            store: RuleStore::new(default_window_ms),
            router: Router::new(),
            engine: AggregationEngine::new(),
            timestamp_field: timestamp_field.into(),
            dropped_halted: 0,
        }
    }

    // -- control plane -------------------------------------------------------

    pub fn apply_mutation(&mut self, record: &RuleRecord) -> CoreResult<StoreEffect> {
        self.apply_compiled(record, None)
    }

    /// Apply a mutation whose rule another store already compiled.
    pub fn apply_compiled(
        &mut self,
        record: &RuleRecord,
        compiled: Option<&Arc<Rule>>,
    ) -> CoreResult<StoreEffect> {
        let effect = self.store.apply_compiled(record, compiled)?;
        self.mirror(&effect);
        Ok(effect)
    }

    /// Decode one JSON mutation record and apply it.
    pub fn apply_mutation_json(&mut self, text: &str) -> CoreResult<StoreEffect> {
        let record = RuleRecord::from_json_str(text).map_err(|e| {
            StructError::from(CoreReason::RuleDecode)
                .with_detail(format!("invalid rule record: {e}"))
        })?;
        self.apply_mutation(&record)
    }

    fn mirror(&mut self, effect: &StoreEffect) {
        match effect {
            StoreEffect::Installed { rule, reset } => {
                if *reset {
                    self.engine.drop_rule(rule.id);
                }
                log::info!("rule {} installed", rule.id);
            }
            StoreEffect::Resumed(rule) => {
                self.engine.resume_rule(rule);
                log::info!("rule {} resumed", rule.id);
            }
            StoreEffect::Paused { rule, reset } => {
                if *reset {
                    self.engine.drop_rule(rule.id);
                } else {
                    self.engine.suspend_rule(rule.id);
                }
                log::info!("rule {} paused", rule.id);
            }
            StoreEffect::Deleted(id) => {
                self.engine.drop_rule(*id);
                log::info!("rule {id} deleted");
            }
            StoreEffect::ClearedAll { halted } => {
                self.engine.clear_all();
                log::info!("aggregate state cleared (halted={halted})");
            }
            StoreEffect::DeletedAll => {
                self.engine.clear_all();
                log::info!("all rules deleted");
            }
            StoreEffect::Unchanged | StoreEffect::Exported(_) => {}
        }
    }

    /// Current rule definitions as an export payload.
    pub fn export(&self) -> RuleExport {
        RuleExport {
            rules: self.store.export(),
        }
    }

    // -- data plane ----------------------------------------------------------

    /// Route one event to every applicable rule and aggregate it.
    pub fn process_event(&mut self, event: Arc<Event>) -> Vec<Alert> {
        if self.store.is_halted() {
            self.dropped_halted += 1;
            return Vec::new();
        }
        let snapshot = self.store.snapshot();
        let mut alerts = self.engine.advance_to(event.timestamp());
        for routed in self.router.route(&snapshot, &event) {
            alerts.extend(self.engine.process(routed));
        }
        alerts
    }

    /// Decode one JSON event with the configured timestamp field and process it.
    pub fn process_event_json(&mut self, text: &str) -> CoreResult<Vec<Alert>> {
        let event = Event::from_json_str(text, &self.timestamp_field)?;
        Ok(self.process_event(Arc::new(event)))
    }

    /// Aggregate an event that was routed elsewhere. The rule is looked up in
    /// this partition's own store; a rule that is not active here is skipped.
    pub fn process_routed(&mut self, routed: Routed) -> Vec<Alert> {
        if self.store.is_halted() {
            self.dropped_halted += 1;
            return Vec::new();
        }
        let Some(rule) = self.store.get(routed.rule.id).filter(|r| r.is_active()) else {
            log::debug!("rule {}: not active in this partition, event skipped", routed.rule.id);
            return Vec::new();
        };
        self.engine.process(Routed { rule, ..routed })
    }

    /// Fire window timers due at `now`.
    pub fn tick(&mut self, now: i64) -> Vec<Alert> {
        self.engine.advance_to(now)
    }

    // -- inspection ----------------------------------------------------------

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    pub fn timestamp_field(&self) -> &str {
        &self.timestamp_field
    }

    /// Events dropped while halted by `CLEAR_STATE_ALL_STOP`.
    pub fn dropped_halted(&self) -> u64 {
        self.dropped_halted
    }
}
