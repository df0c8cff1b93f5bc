//! Candle store: per-key rolling series with snapshot isolation.

use crate::error::{FeedError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use types::{Candle, CandleSeries, SeriesKey};

/// Concurrent store of candle series keyed by `(symbol, timeframe)`.
///
/// Readers get the latest fully-committed `Arc<CandleSeries>` and never
/// block on writers: a commit builds a fresh series value off to the side
/// and swaps the `Arc` in one map update. Writers for the same key are
/// serialized through the map entry; distinct keys commit independently.
pub struct CandleStore {
    series: DashMap<SeriesKey, Arc<CandleSeries>>,
}

impl CandleStore {
    pub fn new() -> Self {
        Self {
            series: DashMap::new(),
        }
    }

    /// Latest committed snapshot for a key, if any bars have landed.
    pub fn get_snapshot(&self, key: &SeriesKey) -> Option<Arc<CandleSeries>> {
        self.series.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Bars currently present for a key.
    pub fn coverage(&self, key: &SeriesKey) -> usize {
        self.series.get(key).map(|s| s.len()).unwrap_or(0)
    }

    /// All keys with at least one committed bar.
    pub fn keys(&self) -> Vec<SeriesKey> {
        self.series.iter().map(|e| e.key().clone()).collect()
    }

    /// Merge a batch of bars into the series for `key` and publish the new
    /// snapshot.
    ///
    /// Bars are merged by `open_time`; an incoming bar at an existing
    /// timestamp replaces the stored one (feeds revise the forming candle).
    /// Every merged bar must satisfy the OHLC invariant and the result must
    /// be strictly increasing in time, otherwise the whole batch is rejected
    /// and the previous snapshot stays current.
    pub fn commit(&self, key: &SeriesKey, incoming: Vec<Candle>) -> Result<Arc<CandleSeries>> {
        if incoming.is_empty() {
            return self
                .get_snapshot(key)
                .ok_or_else(|| FeedError::Disconnected {
                    reason: format!("empty batch for uninitialized series {key}"),
                });
        }

        let mut entry = self
            .series
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CandleSeries::new(key.clone())));

        let current = entry.value();
        let mut merged: Vec<Candle> = Vec::with_capacity(current.len() + incoming.len());
        merged.extend_from_slice(current.bars());
        for bar in incoming {
            match merged.binary_search_by_key(&bar.open_time, |b| b.open_time) {
                Ok(pos) => merged[pos] = bar,
                Err(pos) => merged.insert(pos, bar),
            }
        }

        let degraded = current.degraded;
        let mut next =
            CandleSeries::from_bars(key.clone(), merged).map_err(|source| FeedError::Malformed {
                key: key.clone(),
                source,
            })?;
        next.degraded = degraded;

        debug!(
            key = %key,
            bars = next.len(),
            completeness = next.completeness_ratio,
            "series committed"
        );

        let snapshot = Arc::new(next);
        *entry.value_mut() = Arc::clone(&snapshot);
        Ok(snapshot)
    }

    /// Flag a key as best-effort after enhancement gave up on it. Returns
    /// the completeness ratio for reporting, or `None` for an unknown key.
    pub fn mark_degraded(&self, key: &SeriesKey) -> Option<f64> {
        let mut entry = self.series.entry(key.clone()).or_insert_with(|| {
            warn!(key = %key, "marking never-populated series degraded");
            Arc::new(CandleSeries::new(key.clone()))
        });
        let mut next = (**entry.value()).clone();
        next.degraded = true;
        let ratio = next.completeness_ratio;
        *entry.value_mut() = Arc::new(next);
        Some(ratio)
    }
}

impl Default for CandleStore {
    fn default() -> Self {
        Self::new()
    }
}
