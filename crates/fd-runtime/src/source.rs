use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use fd_core::{Event, RuleRecord};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::DispatchInput;
use crate::metrics::RuntimeMetrics;

/// Files to replay: every rule file, then every event file.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourcePlan {
    pub rules: Vec<PathBuf>,
    pub events: Vec<PathBuf>,
}

impl SourcePlan {
    pub(crate) fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.events.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Rule,
    Event,
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LineKind::Rule => "rule",
            LineKind::Event => "event",
        })
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Read the planned JSONL files in order and feed the dispatcher.
/// Malformed lines are counted and skipped.
#[tracing::instrument(name = "sources", skip_all, fields(rule_files = plan.rules.len(), event_files = plan.events.len()))]
pub(crate) async fn run_sources(
    plan: SourcePlan,
    timestamp_field: String,
    tx: mpsc::Sender<DispatchInput>,
    metrics: Arc<RuntimeMetrics>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let files = plan
        .rules
        .iter()
        .map(|p| (p, LineKind::Rule))
        .chain(plan.events.iter().map(|p| (p, LineKind::Event)));
    for (path, kind) in files {
        let reader = LineReader {
            path,
            kind,
            timestamp_field: &timestamp_field,
            metrics: &metrics,
        };
        if let Flow::Stop = reader.run(&tx, &cancel).await? {
            fd_info!(conn, file = %path.display(), "source stopped early");
            return Ok(());
        }
    }
    fd_info!(conn, "all sources drained");
    Ok(())
}

struct LineReader<'a> {
    path: &'a Path,
    kind: LineKind,
    timestamp_field: &'a str,
    metrics: &'a RuntimeMetrics,
}

impl LineReader<'_> {
    async fn run(
        &self,
        tx: &mpsc::Sender<DispatchInput>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Flow> {
        let file = tokio::fs::File::open(self.path)
            .await
            .with_context(|| format!("open {} file {}", self.kind, self.path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0u64;
        let mut accepted = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Flow::Stop),
                next = lines.next_line() => next,
            };
            let Some(line) = next.with_context(|| format!("read {}", self.path.display()))? else {
                break;
            };
            line_no += 1;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            match self.decode(text) {
                Ok(input) => {
                    accepted += 1;
                    if tx.send(input).await.is_err() {
                        return Ok(Flow::Stop);
                    }
                }
                Err(error) => {
                    self.metrics.inc_malformed();
                    fd_warn!(
                        conn,
                        file = %self.path.display(),
                        line = line_no,
                        kind = %self.kind,
                        error = %error,
                        "malformed line skipped"
                    );
                }
            }
        }

        fd_debug!(conn, file = %self.path.display(), kind = %self.kind, lines = line_no, accepted, "file drained");
        Ok(Flow::Continue)
    }

    fn decode(&self, text: &str) -> Result<DispatchInput, String> {
        match self.kind {
            LineKind::Rule => RuleRecord::from_json_str(text)
                .map(DispatchInput::Rule)
                .map_err(|e| e.to_string()),
            LineKind::Event => {
                let event = Event::from_json_str(text, self.timestamp_field)
                    .map_err(|e| e.to_string())?;
                self.metrics.inc_events_in();
                Ok(DispatchInput::Event(Arc::new(event)))
            }
        }
    }
}
