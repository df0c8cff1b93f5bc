//! Pattern detection vocabulary: detector kinds, price zones, and the
//! immutable candidates emitted by the detection panel.

use crate::market::{Symbol, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction implied by a pattern or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("long"),
            Direction::Short => f.write_str("short"),
        }
    }
}

/// The fixed set of order-flow detectors the panel registers.
///
/// Adding a detector means adding a variant here and registering the
/// implementation with the panel; there is no dynamic discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    OrderBlock,
    FairValueGap,
    LiquidityGrab,
    BreakOfStructure,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::OrderBlock => "order_block",
            DetectorKind::FairValueGap => "fair_value_gap",
            DetectorKind::LiquidityGrab => "liquidity_grab",
            DetectorKind::BreakOfStructure => "break_of_structure",
        }
    }

    /// True for detectors whose output is a supply/demand zone usable as an
    /// entry area. Break of structure is a confirmation, not a zone.
    pub fn is_zone(&self) -> bool {
        !matches!(self, DetectorKind::BreakOfStructure)
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive price band anchoring a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceZone {
    pub low: Decimal,
    pub high: Decimal,
}

impl PriceZone {
    pub fn new(low: Decimal, high: Decimal) -> Self {
        debug_assert!(low <= high, "inverted price zone");
        Self { low, high }
    }

    pub fn midpoint(&self) -> Decimal {
        (self.low + self.high) / Decimal::TWO
    }

    pub fn height(&self) -> Decimal {
        self.high - self.low
    }

    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.low && price <= self.high
    }

    /// Overlap test with a tolerance expressed as a fraction of the taller
    /// zone's height. Zones that merely come within tolerance of touching
    /// still count as overlapping for dedup purposes.
    pub fn overlaps_within(&self, other: &PriceZone, tolerance_pct: f64) -> bool {
        let taller = self.height().max(other.height());
        let slack = taller
            * Decimal::try_from(tolerance_pct).unwrap_or_default();
        self.low <= other.high + slack && other.low <= self.high + slack
    }

    /// Union of two zones.
    pub fn merge(&self, other: &PriceZone) -> PriceZone {
        PriceZone {
            low: self.low.min(other.low),
            high: self.high.max(other.high),
        }
    }
}

/// Identity of a recurring pattern: which detector fired, where.
///
/// Keys the trader memory store; displayed as `order_block:EURUSD:M15`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternKey {
    pub detector: DetectorKind,
    pub symbol: Symbol,
    pub timeframe: Timeframe,
}

impl PatternKey {
    pub fn new(detector: DetectorKind, symbol: Symbol, timeframe: Timeframe) -> Self {
        Self {
            detector,
            symbol,
            timeframe,
        }
    }
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.detector, self.symbol, self.timeframe)
    }
}

/// One detected pattern candidate. Immutable after creation; consumed once
/// by the confluence engine and then promoted into a signal or discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternInstance {
    pub detector: DetectorKind,
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub direction: Direction,
    /// Anchor price levels for the pattern (order block body, gap range,
    /// swept level band).
    pub zone: PriceZone,
    /// Detector-local confidence in [0, 1] before confluence weighting.
    pub raw_confidence: f64,
    pub detected_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PatternInstance {
    pub fn key(&self) -> PatternKey {
        PatternKey::new(self.detector, self.symbol.clone(), self.timeframe)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
