use std::sync::Arc;

use fd_config::SinkUri;
use fd_core::alert::{FileSink, StdoutSink};
use fd_core::{Alert, AlertSink, ExportSink, RuleExport};
use tokio::sync::mpsc;

use crate::metrics::RuntimeMetrics;

pub(crate) fn build_alert_sink(uri: &SinkUri) -> anyhow::Result<Arc<dyn AlertSink>> {
    Ok(match uri {
        SinkUri::File(path) => Arc::new(FileSink::open(path)?),
        SinkUri::Stdout => Arc::new(StdoutSink),
    })
}

pub(crate) fn build_export_sink(uri: &SinkUri) -> anyhow::Result<Arc<dyn ExportSink>> {
    Ok(match uri {
        SinkUri::File(path) => Arc::new(FileSink::open(path)?),
        SinkUri::Stdout => Arc::new(StdoutSink),
    })
}

/// Write alerts until every worker has dropped its sender.
pub(crate) async fn run_alert_sink(
    mut rx: mpsc::Receiver<Alert>,
    sink: Arc<dyn AlertSink>,
    metrics: Arc<RuntimeMetrics>,
) {
    let mut written = 0u64;
    while let Some(alert) = rx.recv().await {
        match sink.send(&alert) {
            Ok(()) => written += 1,
            Err(e) => {
                metrics.inc_sink_errors();
                fd_warn!(res, rule_id = alert.rule_id, error = %e, "alert sink write failed");
            }
        }
    }
    fd_debug!(res, written, "alert sink drained");
}

pub(crate) async fn run_export_sink(
    mut rx: mpsc::Receiver<RuleExport>,
    sink: Arc<dyn ExportSink>,
    metrics: Arc<RuntimeMetrics>,
) {
    while let Some(export) = rx.recv().await {
        if let Err(e) = sink.export(&export) {
            metrics.inc_sink_errors();
            fd_warn!(res, rules = export.rules.len(), error = %e, "export sink write failed");
        } else {
            fd_info!(res, rules = export.rules.len(), "rule export written");
        }
    }
}
