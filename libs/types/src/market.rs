//! Market data primitives: symbols, timeframes, candles, and candle series.
//!
//! `CandleSeries` is the unit of exchange between the candle store and every
//! consumer. Series are built by the store's commit path and handed out as
//! immutable snapshots; the invariants enforced here (`low ≤ open,close ≤
//! high`, strictly increasing `open_time`) hold for every committed series.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Instrument symbol, e.g. `EURUSD` or `XAUUSD`.
///
/// Newtype over the broker symbol string so series keys, pattern keys, and
/// signals cannot accidentally mix symbols with free-form text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Chart timeframe. Variant order is ascending by duration so `Ord` gives
/// "higher timeframe" comparisons directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Bar duration for this timeframe.
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
        }
    }

    /// True when `self` is a strictly higher timeframe than `other`.
    pub fn is_higher_than(&self, other: Timeframe) -> bool {
        self > &other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }

    /// All supported timeframes, ascending.
    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = CandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            other => Err(CandleError::UnknownTimeframe {
                value: other.to_string(),
            }),
        }
    }
}

/// Key identifying one candle series: `(symbol, timeframe)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<Symbol>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.timeframe)
    }
}

/// Errors raised by candle and series validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandleError {
    /// OHLC invariant `low ≤ open,close ≤ high` violated
    #[error("OHLC invariant violated at {open_time}: o={open} h={high} l={low} c={close}")]
    InvariantViolation {
        open_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    },

    /// Bar open_time not strictly after the previous bar
    #[error("non-monotonic open_time: {incoming} does not advance past {last}")]
    NonMonotonicTime {
        last: DateTime<Utc>,
        incoming: DateTime<Utc>,
    },

    /// Negative volume
    #[error("negative volume {volume} at {open_time}")]
    NegativeVolume {
        open_time: DateTime<Utc>,
        volume: Decimal,
    },

    /// Unparseable timeframe string
    #[error("unknown timeframe: {value}")]
    UnknownTimeframe { value: String },
}

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Check the OHLC invariant and volume sign.
    pub fn validate(&self) -> Result<(), CandleError> {
        let body_ok = self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
            && self.low <= self.high;
        if !body_ok {
            return Err(CandleError::InvariantViolation {
                open_time: self.open_time,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        if self.volume < Decimal::ZERO {
            return Err(CandleError::NegativeVolume {
                open_time: self.open_time,
                volume: self.volume,
            });
        }
        Ok(())
    }

    /// True for a bar that closed above its open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// True for a bar that closed below its open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Absolute body size.
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    /// Full bar range high-to-low.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// Ordered series of candles for one `(symbol, timeframe)` with completeness
/// metadata.
///
/// Consumers always hold an immutable snapshot (`Arc<CandleSeries>`); only
/// the candle store's commit path constructs new series values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleSeries {
    pub key: SeriesKey,
    bars: Vec<Candle>,
    /// Bars present / bars expected over the covered span. 1.0 for a gapless
    /// series, 0.0 for an empty one.
    pub completeness_ratio: f64,
    /// Open time of the bar following the most recent detected gap.
    pub last_gap_at: Option<DateTime<Utc>>,
    /// Set when enhancement gave up on this key and coverage is best-effort.
    pub degraded: bool,
}

impl CandleSeries {
    pub fn new(key: SeriesKey) -> Self {
        Self {
            key,
            bars: Vec::new(),
            completeness_ratio: 0.0,
            last_gap_at: None,
            degraded: false,
        }
    }

    /// Build a series from bars, validating every invariant and computing
    /// completeness metadata. Bars must arrive sorted by `open_time`.
    pub fn from_bars(key: SeriesKey, bars: Vec<Candle>) -> Result<Self, CandleError> {
        let mut series = Self::new(key);
        for bar in bars {
            series.append(bar)?;
        }
        series.recompute_metadata();
        Ok(series)
    }

    /// Append one bar, enforcing the OHLC invariant and strictly increasing
    /// open times. Metadata is not recomputed; call `recompute_metadata`
    /// after a batch.
    pub fn append(&mut self, candle: Candle) -> Result<(), CandleError> {
        candle.validate()?;
        if let Some(last) = self.bars.last() {
            if candle.open_time <= last.open_time {
                return Err(CandleError::NonMonotonicTime {
                    last: last.open_time,
                    incoming: candle.open_time,
                });
            }
        }
        self.bars.push(candle);
        Ok(())
    }

    /// Recompute `completeness_ratio` and `last_gap_at` from the bar spacing
    /// implied by the timeframe.
    pub fn recompute_metadata(&mut self) {
        if self.bars.len() < 2 {
            self.completeness_ratio = if self.bars.is_empty() { 0.0 } else { 1.0 };
            self.last_gap_at = None;
            return;
        }
        let step = self.key.timeframe.duration();
        let first = self.bars.first().expect("non-empty").open_time;
        let last = self.bars.last().expect("non-empty").open_time;
        let span = last - first;
        let expected = (span.num_seconds() / step.num_seconds()) + 1;
        self.completeness_ratio = if expected > 0 {
            (self.bars.len() as f64 / expected as f64).min(1.0)
        } else {
            1.0
        };

        self.last_gap_at = self
            .bars
            .windows(2)
            .rev()
            .find(|w| w[1].open_time - w[0].open_time > step)
            .map(|w| w[1].open_time);
    }

    pub fn bars(&self) -> &[Candle] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.bars.last()
    }

    /// The most recent `n` bars, oldest first.
    pub fn tail(&self, n: usize) -> &[Candle] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar(minute: u32, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2025, 6, 2, 12, minute, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: dec!(100),
        }
    }

    #[test]
    fn candle_invariant_rejects_low_above_close() {
        let c = bar(0, dec!(1.10), dec!(1.11), dec!(1.105), dec!(1.10));
        assert!(matches!(
            c.validate(),
            Err(CandleError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn series_rejects_non_monotonic_time() {
        let key = SeriesKey::new("EURUSD", Timeframe::M1);
        let mut series = CandleSeries::new(key);
        series
            .append(bar(1, dec!(1.10), dec!(1.11), dec!(1.09), dec!(1.105)))
            .unwrap();
        let err = series
            .append(bar(1, dec!(1.10), dec!(1.11), dec!(1.09), dec!(1.105)))
            .unwrap_err();
        assert!(matches!(err, CandleError::NonMonotonicTime { .. }));
    }

    #[test]
    fn completeness_reflects_gaps() {
        let key = SeriesKey::new("EURUSD", Timeframe::M1);
        // Bars at minutes 0,1,2,5 — two bars missing in between.
        let bars = vec![
            bar(0, dec!(1.0), dec!(1.1), dec!(0.9), dec!(1.0)),
            bar(1, dec!(1.0), dec!(1.1), dec!(0.9), dec!(1.0)),
            bar(2, dec!(1.0), dec!(1.1), dec!(0.9), dec!(1.0)),
            bar(5, dec!(1.0), dec!(1.1), dec!(0.9), dec!(1.0)),
        ];
        let series = CandleSeries::from_bars(key, bars).unwrap();
        assert!((series.completeness_ratio - 4.0 / 6.0).abs() < 1e-9);
        assert_eq!(
            series.last_gap_at,
            Some(Utc.with_ymd_and_hms(2025, 6, 2, 12, 5, 0).unwrap())
        );
    }

    #[test]
    fn gapless_series_is_fully_complete() {
        let key = SeriesKey::new("EURUSD", Timeframe::M1);
        let bars: Vec<Candle> = (0..10)
            .map(|i| bar(i, dec!(1.0), dec!(1.1), dec!(0.9), dec!(1.0)))
            .collect();
        let series = CandleSeries::from_bars(key, bars).unwrap();
        assert_eq!(series.completeness_ratio, 1.0);
        assert_eq!(series.last_gap_at, None);
    }

    #[test]
    fn timeframe_ordering_matches_duration() {
        assert!(Timeframe::H4.is_higher_than(Timeframe::M15));
        assert!(!Timeframe::M5.is_higher_than(Timeframe::M5));
        let mut tfs = vec![Timeframe::H1, Timeframe::M1, Timeframe::D1];
        tfs.sort();
        assert_eq!(tfs, vec![Timeframe::M1, Timeframe::H1, Timeframe::D1]);
    }
}
