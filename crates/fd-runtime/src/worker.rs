use std::sync::Arc;

use fd_core::{Alert, Pipeline, Routed, Rule, RuleExport, RuleRecord, StoreEffect};
use tokio::sync::mpsc;

use crate::metrics::RuntimeMetrics;

/// Messages a partition worker consumes, in dispatch order.
#[derive(Debug)]
pub(crate) enum WorkerInput {
    /// A mutation already accepted by the dispatcher's replica.
    Control(Arc<Mutation>),
    Routed(Routed),
    /// Advance timers to this time (epoch ms).
    Tick(i64),
}

/// An accepted mutation record plus the rule the dispatcher compiled for it,
/// so replicas install the same `Arc<Rule>` instead of compiling again.
#[derive(Debug)]
pub(crate) struct Mutation {
    pub record: RuleRecord,
    pub compiled: Option<Arc<Rule>>,
}

impl Mutation {
    pub(crate) fn new(record: RuleRecord, effect: &StoreEffect) -> Self {
        let compiled = match effect {
            StoreEffect::Installed { rule, .. }
            | StoreEffect::Paused { rule, .. }
            | StoreEffect::Resumed(rule) => Some(Arc::clone(rule)),
            _ => None,
        };
        Self { record, compiled }
    }
}

#[derive(Debug, Default)]
pub(crate) struct WorkerOutput {
    pub alerts: Vec<Alert>,
    pub export: Option<RuleExport>,
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// One partition: a rule-store replica plus the aggregate state of every
/// `(rule, key)` that hashes here.
pub(crate) struct Worker {
    partition: usize,
    pipeline: Pipeline,
}

impl Worker {
    pub(crate) fn new(partition: usize, pipeline: Pipeline) -> Self {
        Self {
            partition,
            pipeline,
        }
    }

    /// Only partition 0 answers `EXPORT_RULES_CURRENT`.
    fn emits_exports(&self) -> bool {
        self.partition == 0
    }

    pub(crate) fn handle(&mut self, input: WorkerInput) -> WorkerOutput {
        match input {
            WorkerInput::Control(mutation) => self.apply(&mutation),
            WorkerInput::Routed(routed) => WorkerOutput {
                alerts: self.pipeline.process_routed(routed),
                export: None,
            },
            WorkerInput::Tick(now) => WorkerOutput {
                alerts: self.pipeline.tick(now),
                export: None,
            },
        }
    }

    fn apply(&mut self, mutation: &Mutation) -> WorkerOutput {
        let record = &mutation.record;
        match self.pipeline.apply_compiled(record, mutation.compiled.as_ref()) {
            Ok(StoreEffect::Exported(rules)) if self.emits_exports() => WorkerOutput {
                alerts: Vec::new(),
                export: Some(RuleExport { rules }),
            },
            Ok(_) => WorkerOutput::default(),
            Err(e) => {
                fd_debug!(pipe, partition = self.partition, rule_id = record.id, error = %e, "replica rejected mutation");
                WorkerOutput::default()
            }
        }
    }

    pub(crate) fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

/// Drain `rx` until the dispatcher hangs up, forwarding alerts and exports.
#[tracing::instrument(name = "worker", skip_all, fields(partition = worker.partition))]
pub(crate) async fn run_worker(
    mut worker: Worker,
    mut rx: mpsc::Receiver<WorkerInput>,
    alert_tx: mpsc::Sender<Alert>,
    export_tx: mpsc::Sender<RuleExport>,
    metrics: Arc<RuntimeMetrics>,
) -> anyhow::Result<()> {
    fd_debug!(pipe, "worker started");
    'recv: while let Some(input) = rx.recv().await {
        let out = worker.handle(input);
        if let Some(export) = out.export {
            metrics.inc_exports();
            if export_tx.send(export).await.is_err() {
                fd_error!(pipe, "export channel closed, worker stopping");
                break;
            }
        }
        metrics.add_alerts(out.alerts.len() as u64);
        for alert in out.alerts {
            if alert_tx.send(alert).await.is_err() {
                fd_error!(pipe, "alert channel closed, worker stopping");
                break 'recv;
            }
        }
    }

    let stats = worker.pipeline().engine().stats();
    metrics.add_eval_errors(stats.limit_errors);
    fd_info!(
        pipe,
        events = stats.events,
        alerts = stats.alerts,
        windows_closed = stats.windows_closed,
        limit_errors = stats.limit_errors,
        state_errors = stats.state_errors,
        open_keys = worker.pipeline().engine().key_count(),
        "worker stopped"
    );
    Ok(())
}
