//! Test doubles for the data-feed gateway.
//!
//! `MockFeed` is shared by unit tests across the workspace and by the e2e
//! suite: it serves scripted candle series with configurable latency,
//! scripted transient failures, and invalid-symbol responses.

use crate::error::{FeedError, Result};
use crate::gateway::DataFeedGateway;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use types::{Candle, SeriesKey, Symbol, Timeframe};

/// Deterministic synthetic candle series: a gentle sine-ish walk that always
/// satisfies the OHLC invariant, ending at `end`.
pub fn synthetic_candles(
    timeframe: Timeframe,
    bars: usize,
    end: DateTime<Utc>,
    base_price: Decimal,
) -> Vec<Candle> {
    let step = timeframe.duration();
    let mut out = Vec::with_capacity(bars);
    for i in 0..bars {
        let open_time = end - step * ((bars - i) as i32);
        // Small deterministic oscillation, scale-free around base_price.
        let phase = (i % 20) as i64 - 10;
        let drift = base_price * Decimal::new(phase, 4) / Decimal::new(100, 0);
        let open = base_price + drift;
        let close = open + base_price * Decimal::new(if i % 2 == 0 { 3 } else { -3 }, 6);
        let high = open.max(close) + base_price * Decimal::new(5, 6);
        let low = open.min(close) - base_price * Decimal::new(5, 6);
        out.push(Candle {
            open_time,
            open,
            high,
            low,
            close,
            volume: Decimal::new(1_000 + (i as i64 % 500), 0),
        });
    }
    out
}

/// Scripted in-memory data feed.
pub struct MockFeed {
    series: DashMap<SeriesKey, Vec<Candle>>,
    invalid: DashMap<String, ()>,
    fail_counts: DashMap<SeriesKey, u64>,
    latency: RwLock<Duration>,
    connected: AtomicBool,
    calls: AtomicU64,
}

impl MockFeed {
    pub fn new() -> Self {
        Self {
            series: DashMap::new(),
            invalid: DashMap::new(),
            fail_counts: DashMap::new(),
            latency: RwLock::new(Duration::ZERO),
            connected: AtomicBool::new(true),
            calls: AtomicU64::new(0),
        }
    }

    /// Preload `bars` synthetic candles ending now for `(symbol, timeframe)`.
    pub fn preload(&self, symbol: &str, timeframe: Timeframe, bars: usize) {
        let key = SeriesKey::new(symbol, timeframe);
        let candles = synthetic_candles(timeframe, bars, Utc::now(), Decimal::new(110_000, 5));
        self.series.insert(key, candles);
    }

    /// Replace the scripted series for a key with explicit candles.
    pub fn set_series(&self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) {
        self.series
            .insert(SeriesKey::new(symbol, timeframe), candles);
    }

    /// Every fetch answers after this delay.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    /// Treat `symbol` as unknown to the feed.
    pub fn mark_invalid(&self, symbol: &str) {
        self.invalid.insert(symbol.to_string(), ());
    }

    /// Fail the next `n` fetches for a key with `Disconnected`.
    pub fn fail_next(&self, symbol: &str, timeframe: Timeframe, n: u64) {
        self.fail_counts
            .insert(SeriesKey::new(symbol, timeframe), n);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Total fetch calls observed.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataFeedGateway for MockFeed {
    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.invalid.contains_key(symbol.as_str()) {
            return Err(FeedError::InvalidSymbol {
                symbol: symbol.as_str().to_string(),
            });
        }

        let key = SeriesKey::new(symbol.as_str(), timeframe);
        if let Some(mut remaining) = self.fail_counts.get_mut(&key) {
            if *remaining.value() > 0 {
                *remaining.value_mut() -= 1;
                return Err(FeedError::Disconnected {
                    reason: "scripted failure".into(),
                });
            }
        }

        let bars = self
            .series
            .get(&key)
            .map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|c| c.open_time >= from && c.open_time < to)
                    .copied()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Ok(bars)
    }

    async fn connectivity(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_candles_are_valid_and_ordered() {
        let bars = synthetic_candles(Timeframe::M15, 100, Utc::now(), Decimal::new(110_000, 5));
        assert_eq!(bars.len(), 100);
        for bar in &bars {
            bar.validate().unwrap();
        }
        for pair in bars.windows(2) {
            assert!(pair[0].open_time < pair[1].open_time);
        }
    }

    #[tokio::test]
    async fn scripted_failures_then_success() {
        let feed = MockFeed::new();
        feed.preload("EURUSD", Timeframe::M5, 10);
        feed.fail_next("EURUSD", Timeframe::M5, 1);

        let symbol = Symbol::new("EURUSD");
        let now = Utc::now();
        let from = now - Timeframe::M5.duration() * 20;
        assert!(feed
            .fetch_candles(&symbol, Timeframe::M5, from, now)
            .await
            .is_err());
        let bars = feed
            .fetch_candles(&symbol, Timeframe::M5, from, now)
            .await
            .unwrap();
        assert_eq!(bars.len(), 10);
    }
}
