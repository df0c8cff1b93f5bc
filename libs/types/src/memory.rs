//! Outcome memory records: per-pattern-key success history with bounded
//! growth.

use crate::pattern::PatternKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Persistent outcome history for one pattern key.
///
/// Records are created on first occurrence and never deleted; growth is
/// capped by the outcome ring buffer, not by record eviction. `success_rate`
/// is a windowed statistic over the ring buffer so stale regimes age out,
/// while `sample_count` keeps the lifetime total for minimum-sample gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderMemoryRecord {
    pub pattern_key: PatternKey,
    /// Lifetime number of recorded outcomes.
    pub sample_count: u64,
    /// Fraction of wins within the ring-buffer window, in [0, 1].
    pub success_rate: f64,
    /// Most recent outcomes, oldest first, capped at `window_capacity`.
    pub last_outcomes: VecDeque<bool>,
    /// Maximum ring-buffer length.
    pub window_capacity: usize,
    pub last_updated: DateTime<Utc>,
}

impl TraderMemoryRecord {
    pub fn new(pattern_key: PatternKey, window_capacity: usize, now: DateTime<Utc>) -> Self {
        Self {
            pattern_key,
            sample_count: 0,
            success_rate: 0.0,
            last_outcomes: VecDeque::with_capacity(window_capacity),
            window_capacity,
            last_updated: now,
        }
    }

    /// Record one trade outcome and recompute the windowed success rate.
    pub fn record(&mut self, success: bool, now: DateTime<Utc>) {
        if self.last_outcomes.len() == self.window_capacity {
            self.last_outcomes.pop_front();
        }
        self.last_outcomes.push_back(success);
        self.sample_count += 1;
        let wins = self.last_outcomes.iter().filter(|o| **o).count();
        self.success_rate = wins as f64 / self.last_outcomes.len() as f64;
        self.last_updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Symbol, Timeframe};
    use crate::pattern::DetectorKind;

    fn record() -> TraderMemoryRecord {
        TraderMemoryRecord::new(
            PatternKey::new(
                DetectorKind::FairValueGap,
                Symbol::new("GBPUSD"),
                Timeframe::H1,
            ),
            4,
            Utc::now(),
        )
    }

    #[test]
    fn ring_buffer_caps_window_but_not_sample_count() {
        let mut r = record();
        for _ in 0..10 {
            r.record(true, Utc::now());
        }
        assert_eq!(r.sample_count, 10);
        assert_eq!(r.last_outcomes.len(), 4);
        assert_eq!(r.success_rate, 1.0);
    }

    #[test]
    fn success_rate_is_windowed() {
        let mut r = record();
        // Four losses, then four wins: the losses age out entirely.
        for _ in 0..4 {
            r.record(false, Utc::now());
        }
        assert_eq!(r.success_rate, 0.0);
        for _ in 0..4 {
            r.record(true, Utc::now());
        }
        assert_eq!(r.success_rate, 1.0);
        assert_eq!(r.sample_count, 8);
    }
}
