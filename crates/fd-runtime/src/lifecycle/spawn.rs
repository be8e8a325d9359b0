use std::sync::Arc;

use fd_config::FraudConfig;
use fd_core::{Alert, AlertSink, ExportSink, Pipeline, RuleExport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{DispatchInput, Dispatcher};
use crate::metrics::RuntimeMetrics;
use crate::sink_task::{run_alert_sink, run_export_sink};
use crate::source::{SourcePlan, run_sources};
use crate::tick_task::run_ticker;
use crate::worker::{Worker, WorkerInput, run_worker};

use super::types::TaskGroup;

// ---------------------------------------------------------------------------
// Each helper builds the channel its task consumes and returns the sender.
// ---------------------------------------------------------------------------

pub(super) fn spawn_alert_task(
    sink: Arc<dyn AlertSink>,
    capacity: usize,
    metrics: Arc<RuntimeMetrics>,
) -> (mpsc::Sender<Alert>, TaskGroup) {
    let (tx, rx) = mpsc::channel(capacity);
    let mut group = TaskGroup::new("alerts");
    group.push(tokio::spawn(async move {
        run_alert_sink(rx, sink, metrics).await;
        Ok(())
    }));
    (tx, group)
}

pub(super) fn spawn_export_task(
    sink: Arc<dyn ExportSink>,
    capacity: usize,
    metrics: Arc<RuntimeMetrics>,
) -> (mpsc::Sender<RuleExport>, TaskGroup) {
    let (tx, rx) = mpsc::channel(capacity);
    let mut group = TaskGroup::new("exports");
    group.push(tokio::spawn(async move {
        run_export_sink(rx, sink, metrics).await;
        Ok(())
    }));
    (tx, group)
}

/// One worker per partition, each owning a fresh store replica and engine.
pub(super) fn spawn_workers(
    config: &FraudConfig,
    alert_tx: mpsc::Sender<Alert>,
    export_tx: mpsc::Sender<RuleExport>,
    metrics: &Arc<RuntimeMetrics>,
) -> (Vec<mpsc::Sender<WorkerInput>>, TaskGroup) {
    let window_ms = config.runtime.default_window.as_millis_i64();
    let mut senders = Vec::with_capacity(config.runtime.partitions);
    let mut group = TaskGroup::new("workers");
    for partition in 0..config.runtime.partitions {
        let (tx, rx) = mpsc::channel(config.runtime.channel_capacity);
        let pipeline = Pipeline::new(window_ms, config.event.timestamp_field.clone());
        group.push(tokio::spawn(run_worker(
            Worker::new(partition, pipeline),
            rx,
            alert_tx.clone(),
            export_tx.clone(),
            Arc::clone(metrics),
        )));
        senders.push(tx);
    }
    // The sink channels close once the last worker exits.
    drop(alert_tx);
    drop(export_tx);
    (senders, group)
}

pub(super) fn spawn_dispatcher(
    config: &FraudConfig,
    workers: Vec<mpsc::Sender<WorkerInput>>,
    metrics: Arc<RuntimeMetrics>,
) -> (mpsc::Sender<DispatchInput>, TaskGroup) {
    let (tx, rx) = mpsc::channel(config.runtime.channel_capacity);
    let dispatcher = Dispatcher::new(
        config.runtime.default_window.as_millis_i64(),
        workers,
        config.runtime.time_mode,
        metrics,
    );
    let mut group = TaskGroup::new("dispatcher");
    group.push(tokio::spawn(dispatcher.run(rx)));
    (tx, group)
}

pub(super) fn spawn_ticker(
    config: &FraudConfig,
    tx: mpsc::Sender<DispatchInput>,
    cancel: CancellationToken,
) -> TaskGroup {
    let every = config.runtime.tick_interval.as_duration();
    let mut group = TaskGroup::new("tick");
    group.push(tokio::spawn(async move {
        run_ticker(tx, every, cancel).await;
        Ok(())
    }));
    group
}

pub(super) fn spawn_sources(
    config: &FraudConfig,
    plan: SourcePlan,
    tx: mpsc::Sender<DispatchInput>,
    metrics: Arc<RuntimeMetrics>,
    cancel: CancellationToken,
) -> TaskGroup {
    let mut group = TaskGroup::new("sources");
    group.push(tokio::spawn(run_sources(
        plan,
        config.event.timestamp_field.clone(),
        tx,
        metrics,
        cancel,
    )));
    group
}
