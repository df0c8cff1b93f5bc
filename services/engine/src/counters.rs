//! Performance counters exposed to consumers.
//!
//! Plain atomics on the hot paths; `snapshot()` gives consumers a coherent
//! point-in-time copy. Counts are observational and never load-bearing.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PerformanceCounters {
    detection_runs: AtomicU64,
    candidates_found: AtomicU64,
    candidates_suppressed: AtomicU64,
    signals_emitted: AtomicU64,
    signals_rejected: AtomicU64,
    signals_cancelled: AtomicU64,
    orders_acknowledged: AtomicU64,
    outcomes_recorded: AtomicU64,
    halts_triggered: AtomicU64,
    coverage_degraded: AtomicU64,
}

/// Point-in-time counter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    pub detection_runs: u64,
    pub candidates_found: u64,
    pub candidates_suppressed: u64,
    pub signals_emitted: u64,
    pub signals_rejected: u64,
    pub signals_cancelled: u64,
    pub orders_acknowledged: u64,
    pub outcomes_recorded: u64,
    pub halts_triggered: u64,
    pub coverage_degraded: u64,
}

impl PerformanceCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_detection_run(&self, candidates: u64) {
        self.detection_runs.fetch_add(1, Ordering::Relaxed);
        self.candidates_found.fetch_add(candidates, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self, n: u64) {
        self.candidates_suppressed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_signal_emitted(&self) {
        self.signals_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signal_rejected(&self) {
        self.signals_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signal_cancelled(&self) {
        self.signals_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_order_acknowledged(&self) {
        self.orders_acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self) {
        self.outcomes_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_halt(&self) {
        self.halts_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coverage_degraded(&self) {
        self.coverage_degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            detection_runs: self.detection_runs.load(Ordering::Relaxed),
            candidates_found: self.candidates_found.load(Ordering::Relaxed),
            candidates_suppressed: self.candidates_suppressed.load(Ordering::Relaxed),
            signals_emitted: self.signals_emitted.load(Ordering::Relaxed),
            signals_rejected: self.signals_rejected.load(Ordering::Relaxed),
            signals_cancelled: self.signals_cancelled.load(Ordering::Relaxed),
            orders_acknowledged: self.orders_acknowledged.load(Ordering::Relaxed),
            outcomes_recorded: self.outcomes_recorded.load(Ordering::Relaxed),
            halts_triggered: self.halts_triggered.load(Ordering::Relaxed),
            coverage_degraded: self.coverage_degraded.load(Ordering::Relaxed),
        }
    }
}
