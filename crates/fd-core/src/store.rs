use std::collections::BTreeMap;
use std::sync::Arc;

use orion_error::prelude::*;

use crate::error::{CoreReason, CoreResult};
use crate::rule::{Command, DEFAULT_WINDOW_MS, Rule, RuleId, RuleRecord, RuleState};

/// Immutable view of the rule table handed to readers.
pub type RuleSnapshot = Arc<BTreeMap<RuleId, Arc<Rule>>>;

/// What applying one mutation did. Callers mirror it onto aggregate state.
#[derive(Debug, Clone)]
pub enum StoreEffect {
    /// A new or changed ACTIVE definition. `reset` is true when a different
    /// definition existed and its state must be dropped.
    Installed { rule: Arc<Rule>, reset: bool },
    /// A paused rule became ACTIVE again with the same definition.
    Resumed(Arc<Rule>),
    /// The rule is now paused. `reset` as for `Installed`.
    Paused { rule: Arc<Rule>, reset: bool },
    Deleted(RuleId),
    /// Nothing changed.
    Unchanged,
    ClearedAll { halted: bool },
    DeletedAll,
    Exported(Vec<RuleRecord>),
}

/// The live rule table.
///
/// Mutations replace the shared map copy-on-write, so a snapshot taken before
/// a mutation never observes it.
#[derive(Debug, Clone)]
pub struct RuleStore {
    rules: RuleSnapshot,
    halted: bool,
    default_window_ms: i64,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

impl RuleStore {
    pub fn new(default_window_ms: i64) -> Self {
        Self {
            rules: Arc::new(BTreeMap::new()),
            halted: false,
            default_window_ms,
        }
    }

    pub fn snapshot(&self) -> RuleSnapshot {
        Arc::clone(&self.rules)
    }

    pub fn get(&self, id: RuleId) -> Option<Arc<Rule>> {
        self.rules.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Set by `CLEAR_STATE_ALL_STOP`; cleared by the next broadcast rule.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn active_rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.values().filter(|r| r.is_active())
    }

    /// Apply one mutation record. Records are applied in arrival order; a
    /// rejected record leaves the store untouched.
    pub fn apply(&mut self, record: &RuleRecord) -> CoreResult<StoreEffect> {
        self.apply_compiled(record, None)
    }

    /// Like [`apply`](Self::apply), but reuses `compiled` wherever the record
    /// needs compiling and `compiled` was built from that same record.
    /// Replicas fed by one primary store share its compiled rules this way.
    pub fn apply_compiled(
        &mut self,
        record: &RuleRecord,
        compiled: Option<&Arc<Rule>>,
    ) -> CoreResult<StoreEffect> {
        let effect = match record.state {
            RuleState::Active => self.apply_active(record, compiled)?,
            RuleState::Pause => self.apply_pause(record, compiled)?,
            RuleState::Delete => match Arc::make_mut(&mut self.rules).remove(&record.id) {
                Some(_) => StoreEffect::Deleted(record.id),
                None => StoreEffect::Unchanged,
            },
            RuleState::Control => self.apply_command(record.command),
        };
        if record.state != RuleState::Control || record.command == Command::BroadcastRule {
            self.halted = false;
        }
        Ok(effect)
    }

    fn apply_active(
        &mut self,
        record: &RuleRecord,
        compiled: Option<&Arc<Rule>>,
    ) -> CoreResult<StoreEffect> {
        let existing = self.rules.get(&record.id).cloned();
        if let Some(current) = &existing {
            if current.record().same_body(record) {
                if current.is_active() {
                    return Ok(StoreEffect::Unchanged);
                }
                let resumed = Arc::new(current.with_state(RuleState::Active));
                self.insert(Arc::clone(&resumed));
                return Ok(StoreEffect::Resumed(resumed));
            }
        }
        let rule = self.compile(record, compiled)?;
        self.insert(Arc::clone(&rule));
        Ok(StoreEffect::Installed {
            rule,
            reset: existing.is_some(),
        })
    }

    fn apply_pause(
        &mut self,
        record: &RuleRecord,
        compiled: Option<&Arc<Rule>>,
    ) -> CoreResult<StoreEffect> {
        let existing = self.rules.get(&record.id).cloned();
        if record.is_bare() {
            let Some(current) = existing else {
                return StructError::from(CoreReason::RuleDecode)
                    .with_detail(format!("rule {}: cannot pause unknown rule", record.id))
                    .err();
            };
            if !current.is_active() {
                return Ok(StoreEffect::Unchanged);
            }
            let paused = Arc::new(current.with_state(RuleState::Pause));
            self.insert(Arc::clone(&paused));
            return Ok(StoreEffect::Paused {
                rule: paused,
                reset: false,
            });
        }

        if let Some(current) = &existing {
            if current.record().same_body(record) {
                if !current.is_active() {
                    return Ok(StoreEffect::Unchanged);
                }
                let paused = Arc::new(current.with_state(RuleState::Pause));
                self.insert(Arc::clone(&paused));
                return Ok(StoreEffect::Paused {
                    rule: paused,
                    reset: false,
                });
            }
        }
        let rule = self.compile(record, compiled)?;
        self.insert(Arc::clone(&rule));
        Ok(StoreEffect::Paused {
            rule,
            reset: existing.is_some(),
        })
    }

    fn apply_command(&mut self, command: Command) -> StoreEffect {
        match command {
            // Lifting a halt happens in `apply`.
            Command::BroadcastRule => StoreEffect::Unchanged,
            Command::ClearStateAll => StoreEffect::ClearedAll { halted: false },
            Command::ClearStateAllStop => {
                self.halted = true;
                StoreEffect::ClearedAll { halted: true }
            }
            Command::DeleteRulesAll => {
                self.rules = Arc::new(BTreeMap::new());
                StoreEffect::DeletedAll
            }
            Command::ExportRulesCurrent => StoreEffect::Exported(self.export()),
        }
    }

    fn compile(&self, record: &RuleRecord, compiled: Option<&Arc<Rule>>) -> CoreResult<Arc<Rule>> {
        match compiled {
            Some(rule) if rule.state == record.state && rule.record().same_body(record) => {
                Ok(Arc::clone(rule))
            }
            _ => Ok(Arc::new(Rule::compile(record, self.default_window_ms)?)),
        }
    }

    fn insert(&mut self, rule: Arc<Rule>) {
        Arc::make_mut(&mut self.rules).insert(rule.id, rule);
    }

    /// Current definitions in wire form, ordered by id.
    pub fn export(&self) -> Vec<RuleRecord> {
        self.rules.values().map(|r| r.record().clone()).collect()
    }

    /// Apply exported records in order, returning the effect of each.
    pub fn import(&mut self, records: &[RuleRecord]) -> CoreResult<Vec<StoreEffect>> {
        records.iter().map(|r| self.apply(r)).collect()
    }
}
