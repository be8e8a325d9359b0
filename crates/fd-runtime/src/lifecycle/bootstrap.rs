use std::path::{Path, PathBuf};

use fd_config::{FraudConfig, parse_sink_uri, resolve_paths};
use orion_error::ErrorOweBase;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::sink_task::{build_alert_sink, build_export_sink};
use crate::source::SourcePlan;

use super::types::BootstrapData;

/// Open the sinks and expand the source patterns, relative to `base_dir`.
pub(super) fn resolve(config: &FraudConfig, base_dir: &Path) -> RuntimeResult<BootstrapData> {
    let alert_uri = parse_sink_uri(&config.sinks.alerts)
        .owe(RuntimeReason::Bootstrap)?
        .resolve(base_dir);
    let export_uri = parse_sink_uri(&config.sinks.exports)
        .owe(RuntimeReason::Bootstrap)?
        .resolve(base_dir);
    fd_debug!(conf, alerts = ?alert_uri, exports = ?export_uri, "sinks resolved");

    let alert_sink = build_alert_sink(&alert_uri).owe(RuntimeReason::Bootstrap)?;
    let export_sink = build_export_sink(&export_uri).owe(RuntimeReason::Bootstrap)?;

    let sources = SourcePlan {
        rules: expand(config.sources.rules.as_deref(), base_dir)?,
        events: expand(config.sources.events.as_deref(), base_dir)?,
    };
    fd_debug!(
        conf,
        rule_files = sources.rules.len(),
        event_files = sources.events.len(),
        "sources resolved"
    );

    Ok(BootstrapData {
        alert_sink,
        export_sink,
        sources,
    })
}

fn expand(pattern: Option<&str>, base_dir: &Path) -> RuntimeResult<Vec<PathBuf>> {
    match pattern {
        Some(p) => resolve_paths(p, base_dir).owe(RuntimeReason::Bootstrap),
        None => Ok(Vec::new()),
    }
}
