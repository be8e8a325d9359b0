use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::dispatch::DispatchInput;

pub(crate) fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Periodically ask the dispatcher to advance every partition's timers.
#[tracing::instrument(name = "tick", skip_all)]
pub(crate) async fn run_ticker(
    tx: mpsc::Sender<DispatchInput>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if tx.send(DispatchInput::Tick(wall_clock_ms())).await.is_err() {
                    break;
                }
            }
        }
    }
    fd_debug!(sys, "ticker stopped");
}
