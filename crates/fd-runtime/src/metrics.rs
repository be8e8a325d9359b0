use std::sync::atomic::{AtomicU64, Ordering};

/// Engine-wide counters shared by every task. Updates are relaxed atomics;
/// the totals are read once at shutdown or by tests.
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    events_in: AtomicU64,
    malformed_lines: AtomicU64,
    routed: AtomicU64,
    alerts: AtomicU64,
    exports: AtomicU64,
    mutations_applied: AtomicU64,
    rejected_mutations: AtomicU64,
    eval_errors: AtomicU64,
    dropped_halted: AtomicU64,
    sink_errors: AtomicU64,
}

/// Point-in-time copy of [`RuntimeMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_in: u64,
    pub malformed_lines: u64,
    pub routed: u64,
    pub alerts: u64,
    pub exports: u64,
    pub mutations_applied: u64,
    pub rejected_mutations: u64,
    pub eval_errors: u64,
    pub dropped_halted: u64,
    pub sink_errors: u64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_events_in(&self) {
        self.events_in.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_malformed(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_routed(&self, n: u64) {
        self.routed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_alerts(&self, n: u64) {
        self.alerts.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_exports(&self) {
        self.exports.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_mutations_applied(&self) {
        self.mutations_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_rejected_mutations(&self) {
        self.rejected_mutations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_eval_errors(&self, n: u64) {
        self.eval_errors.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_dropped_halted(&self) {
        self.dropped_halted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_sink_errors(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            events_in: load(&self.events_in),
            malformed_lines: load(&self.malformed_lines),
            routed: load(&self.routed),
            alerts: load(&self.alerts),
            exports: load(&self.exports),
            mutations_applied: load(&self.mutations_applied),
            rejected_mutations: load(&self.rejected_mutations),
            eval_errors: load(&self.eval_errors),
            dropped_halted: load(&self.dropped_halted),
            sink_errors: load(&self.sink_errors),
        }
    }

    pub(crate) fn log_summary(&self) {
        let s = self.snapshot();
        fd_info!(
            sys,
            events_in = s.events_in,
            malformed_lines = s.malformed_lines,
            routed = s.routed,
            alerts = s.alerts,
            exports = s.exports,
            mutations_applied = s.mutations_applied,
            rejected_mutations = s.rejected_mutations,
            eval_errors = s.eval_errors,
            dropped_halted = s.dropped_halted,
            sink_errors = s.sink_errors,
            "runtime totals"
        );
    }
}
