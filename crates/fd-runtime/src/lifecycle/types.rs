use std::sync::Arc;

use fd_core::{AlertSink, ExportSink};
use orion_error::ErrorOweBase;
use orion_error::prelude::*;
use tokio::task::JoinHandle;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::source::SourcePlan;

// ---------------------------------------------------------------------------
// TaskGroup
// ---------------------------------------------------------------------------

/// Tasks that stop together. Groups are joined in reverse start order so
/// producers finish before the consumers they feed:
///
///   start:  alerts → exports → workers → dispatcher → tick → sources
///   join:   sources → tick → dispatcher → workers → exports → alerts
pub(crate) struct TaskGroup {
    pub(super) name: &'static str,
    handles: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl TaskGroup {
    pub(super) fn new(name: &'static str) -> Self {
        Self {
            name,
            handles: Vec::new(),
        }
    }

    pub(super) fn push(&mut self, handle: JoinHandle<anyhow::Result<()>>) {
        self.handles.push(handle);
    }

    /// Join every task, returning the first failure.
    pub(super) async fn wait(self) -> RuntimeResult<()> {
        for handle in self.handles {
            handle
                .await
                .map_err(|e| {
                    StructError::from(RuntimeReason::Shutdown)
                        .with_detail(format!("task join error: {e}"))
                })?
                .owe(RuntimeReason::Shutdown)?;
        }
        Ok(())
    }
}

/// Everything resolved from configuration before any task starts.
pub(super) struct BootstrapData {
    pub alert_sink: Arc<dyn AlertSink>,
    pub export_sink: Arc<dyn ExportSink>,
    pub sources: SourcePlan,
}
