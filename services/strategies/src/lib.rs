//! # Vigil Strategy Service
//!
//! The analytical core: a fixed panel of order-flow pattern detectors, the
//! confluence engine that turns raw candidates into scored trading signals,
//! and the trader memory store that biases scoring with persisted outcome
//! history.
//!
//! ## Detection model
//!
//! Each detector is a pure function over an immutable candle-series
//! snapshot: `detect(&CandleSeries) -> Vec<PatternInstance>`. Detectors
//! never mutate shared state and never see each other's output; a failing
//! detector is logged and isolated, it cannot abort the panel.
//!
//! ## Scoring model
//!
//! Candidates for one symbol are merged across timeframes. Higher-timeframe
//! agreement multiplies confidence (bounded); missing higher-timeframe
//! context caps it. A pattern key whose historical success rate sits below
//! the configured floor is suppressed outright — a false-positive filter,
//! not a discount.

pub mod confluence;
pub mod detectors;
pub mod error;
pub mod memory;
mod swing;

pub use confluence::{ConfluenceConfidenceEngine, ScoreOutcome, SuppressedCandidate};
pub use detectors::{
    BreakOfStructureDetector, FairValueGapDetector, LiquidityGrabDetector, OrderBlockDetector,
    PatternDetectionPanel, PatternDetector,
};
pub use error::{DetectionError, MemoryError};
pub use memory::{MemoryPayload, TraderMemoryStore};
