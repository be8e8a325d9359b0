use std::sync::Arc;

use fd_config::TimeMode;
use fd_core::{Event, Router, RuleRecord, RuleStore, StoreEffect, partition_of};
use tokio::sync::mpsc;

use crate::metrics::RuntimeMetrics;
use crate::worker::{Mutation, WorkerInput};

/// Messages the dispatcher consumes from sources and the tick task.
#[derive(Debug)]
pub(crate) enum DispatchInput {
    Rule(RuleRecord),
    Event(Arc<Event>),
    /// Wall-clock time of a tick, epoch ms.
    Tick(i64),
}

/// Single entry point for all traffic. Keeps its own store replica to
/// validate mutations and route events, and feeds every partition worker
/// through one ordered channel each.
pub(crate) struct Dispatcher {
    store: RuleStore,
    router: Router,
    workers: Vec<mpsc::Sender<WorkerInput>>,
    time_mode: TimeMode,
    watermark: Option<i64>,
    metrics: Arc<RuntimeMetrics>,
}

impl Dispatcher {
    pub(crate) fn new(
        default_window_ms: i64,
        workers: Vec<mpsc::Sender<WorkerInput>>,
        time_mode: TimeMode,
        metrics: Arc<RuntimeMetrics>,
    ) -> Self {
        Self {
            store: RuleStore::new(default_window_ms),
            router: Router::new(),
            workers,
            time_mode,
            watermark: None,
            metrics,
        }
    }

    /// Apply one input. Returns `false` once a worker has gone away.
    pub(crate) async fn handle(&mut self, input: DispatchInput) -> bool {
        match input {
            DispatchInput::Rule(record) => self.apply_rule(record).await,
            DispatchInput::Event(event) => self.dispatch_event(event).await,
            DispatchInput::Tick(wall_ms) => self.tick(wall_ms).await,
        }
    }

    async fn apply_rule(&mut self, record: RuleRecord) -> bool {
        match self.store.apply(&record) {
            Ok(effect) => {
                self.metrics.inc_mutations_applied();
                fd_info!(
                    rule,
                    rule_id = record.id,
                    state = record.state.as_str(),
                    effect = effect_label(&effect),
                    "rule mutation applied"
                );
                // Every accepted record is broadcast, no-ops included.
                let shared = Arc::new(Mutation::new(record, &effect));
                self.broadcast(|| WorkerInput::Control(Arc::clone(&shared)))
                    .await
            }
            Err(e) => {
                self.metrics.inc_rejected_mutations();
                fd_warn!(rule, rule_id = record.id, error = %e, "rule mutation rejected");
                true
            }
        }
    }

    async fn dispatch_event(&mut self, event: Arc<Event>) -> bool {
        if self.store.is_halted() {
            self.metrics.inc_dropped_halted();
            return true;
        }
        let ts = event.timestamp();
        self.watermark = Some(self.watermark.map_or(ts, |w| w.max(ts)));

        let snapshot = self.store.snapshot();
        let routed = self.router.route(&snapshot, &event);
        self.metrics.add_routed(routed.len() as u64);
        for r in routed {
            let partition = partition_of(r.rule.id, &r.key, self.workers.len());
            if self.workers[partition]
                .send(WorkerInput::Routed(r))
                .await
                .is_err()
            {
                return false;
            }
        }
        true
    }

    async fn tick(&mut self, wall_ms: i64) -> bool {
        let now = match self.time_mode {
            TimeMode::Processing => wall_ms,
            TimeMode::Event => match self.watermark {
                Some(w) => w,
                None => return true,
            },
        };
        self.broadcast(|| WorkerInput::Tick(now)).await
    }

    async fn broadcast(&self, mut input: impl FnMut() -> WorkerInput) -> bool {
        for tx in &self.workers {
            if tx.send(input()).await.is_err() {
                return false;
            }
        }
        true
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<DispatchInput>) -> anyhow::Result<()> {
        while let Some(input) = rx.recv().await {
            if !self.handle(input).await {
                fd_error!(pipe, "worker channel closed, dispatcher stopping");
                break;
            }
        }
        let stats = self.router.stats();
        self.metrics.add_eval_errors(stats.filter_errors);
        fd_info!(
            pipe,
            events = stats.events,
            routed = stats.routed,
            filter_errors = stats.filter_errors,
            missing_keys = stats.missing_keys,
            rules = self.store.len(),
            "dispatcher stopped"
        );
        Ok(())
    }
}

fn effect_label(effect: &StoreEffect) -> &'static str {
    match effect {
        StoreEffect::Installed { reset: true, .. } => "replaced",
        StoreEffect::Installed { .. } => "installed",
        StoreEffect::Resumed(_) => "resumed",
        StoreEffect::Paused { .. } => "paused",
        StoreEffect::Deleted(_) => "deleted",
        StoreEffect::Unchanged => "unchanged",
        StoreEffect::ClearedAll { halted: true } => "cleared-and-halted",
        StoreEffect::ClearedAll { .. } => "cleared",
        StoreEffect::DeletedAll => "deleted-all",
        StoreEffect::Exported(_) => "exported",
    }
}
