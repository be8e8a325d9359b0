mod bootstrap;
mod signal;
mod spawn;
mod types;

use std::path::Path;
use std::sync::Arc;

use fd_config::FraudConfig;
use orion_error::op_context;
use orion_error::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeResult;
use crate::metrics::RuntimeMetrics;

pub use signal::wait_for_signal;

use spawn::{
    spawn_alert_task, spawn_dispatcher, spawn_export_task, spawn_sources, spawn_ticker,
    spawn_workers,
};
use types::TaskGroup;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Running fraud-detection engine: sources feed one dispatcher, which feeds
/// `partitions` workers, which feed the alert and export sinks.
///
/// The engine stops on its own once every source file is drained, or early
/// on [`shutdown`](Self::shutdown). Open windows are not flushed.
pub struct Engine {
    cancel: CancellationToken,
    /// Cancelled only after the sources have stopped, so the dispatcher
    /// channel closes behind the last source record.
    tick_cancel: CancellationToken,
    groups: Vec<TaskGroup>,
    metrics: Arc<RuntimeMetrics>,
}

impl Engine {
    /// Resolve sinks and sources relative to `base_dir`, then spawn every task.
    #[tracing::instrument(name = "engine.start", skip_all, fields(partitions = config.runtime.partitions))]
    pub async fn start(config: FraudConfig, base_dir: &Path) -> RuntimeResult<Self> {
        let mut op = op_context!("engine-bootstrap").with_auto_log();
        op.record("base_dir", base_dir.display().to_string().as_str());

        let data = bootstrap::resolve(&config, base_dir)?;
        if data.sources.is_empty() {
            fd_warn!(conf, "no rule or event sources configured");
        }

        let cancel = CancellationToken::new();
        let tick_cancel = CancellationToken::new();
        let metrics = Arc::new(RuntimeMetrics::new());
        let capacity = config.runtime.channel_capacity;

        let mut groups = Vec::with_capacity(6);
        let (alert_tx, group) =
            spawn_alert_task(data.alert_sink, capacity, Arc::clone(&metrics));
        groups.push(group);
        let (export_tx, group) =
            spawn_export_task(data.export_sink, capacity, Arc::clone(&metrics));
        groups.push(group);
        let (workers, group) = spawn_workers(&config, alert_tx, export_tx, &metrics);
        groups.push(group);
        let (dispatch_tx, group) = spawn_dispatcher(&config, workers, Arc::clone(&metrics));
        groups.push(group);
        groups.push(spawn_ticker(&config, dispatch_tx.clone(), tick_cancel.clone()));
        groups.push(spawn_sources(
            &config,
            data.sources,
            dispatch_tx,
            Arc::clone(&metrics),
            cancel.child_token(),
        ));

        fd_info!(
            sys,
            partitions = config.runtime.partitions,
            time_mode = ?config.runtime.time_mode,
            tick_interval = %config.runtime.tick_interval,
            "engine started"
        );
        op.mark_suc();
        Ok(Self {
            cancel,
            tick_cancel,
            groups,
            metrics,
        })
    }

    pub fn metrics(&self) -> Arc<RuntimeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Stop reading sources; everything already read is still processed.
    pub fn shutdown(&self) {
        fd_info!(sys, "initiating graceful shutdown");
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Join the task groups in reverse start order.
    pub async fn wait(mut self) -> RuntimeResult<()> {
        while let Some(group) = self.groups.pop() {
            let name = group.name;
            fd_debug!(sys, task_group = name, "waiting for task group");
            let result = group.wait().await;
            if name == "sources" {
                self.tick_cancel.cancel();
            }
            result?;
            fd_debug!(sys, task_group = name, "task group finished");
        }
        self.metrics.log_summary();
        Ok(())
    }
}
