//! # Vigil Shared Types
//!
//! Unified type vocabulary for every Vigil service: market data series,
//! pattern candidates, trading signals, outcome memory, account health, and
//! the engine event stream.
//!
//! ## Design Philosophy
//!
//! - **Single type crate**: every service speaks the same domain language;
//!   no per-service redefinitions of `Candle` or `TradingSignal`.
//! - **No precision loss**: all prices, sizes, and account values are
//!   `rust_decimal::Decimal`. Ratios and confidences are `f64` and never
//!   carry money.
//! - **Immutable hand-off**: snapshot-style types (`CandleSeries`,
//!   `AccountHealthSnapshot`) are produced by exactly one writer and shared
//!   read-only behind `Arc`/watch channels.
//! - **Typed reasons**: rejections, halts, and state transitions carry enum
//!   reason codes, never bare strings.

pub mod account;
pub mod events;
pub mod market;
pub mod memory;
pub mod pattern;
pub mod persist;
pub mod signal;

pub use account::{AccountHealthSnapshot, AccountMetrics, HaltReason, HaltState, HealthBand};
pub use events::EngineEvent;
pub use market::{Candle, CandleError, CandleSeries, SeriesKey, Symbol, Timeframe};
pub use memory::TraderMemoryRecord;
pub use pattern::{DetectorKind, Direction, PatternInstance, PatternKey, PriceZone};
pub use persist::{PersistedSnapshot, SnapshotMeta, SNAPSHOT_VERSION};
pub use signal::{RejectReason, SignalGrade, SignalId, SignalState, TradingSignal};
