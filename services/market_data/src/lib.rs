//! # Vigil Market Data Service
//!
//! Owns the candle cache and the two-phase data pipeline feeding every
//! analytical subsystem:
//!
//! 1. **Warm-up** — synchronous, SLA-bounded population of the critical
//!    `(symbol, timeframe)` set to a minimum bar count. Returns a
//!    partial-readiness report at the deadline instead of blocking or
//!    failing.
//! 2. **Enhancement** — background, cancellable widening of coverage at low
//!    priority, with per-key exponential backoff and a degraded marking once
//!    retries are exhausted.
//!
//! ## Consistency
//!
//! `CandleStore` hands out `Arc<CandleSeries>` snapshots that are swapped
//! atomically on commit — readers never observe a half-written series and
//! never block on writers. Commits for one key are serialized through the
//! store's per-key entry; warm-up and enhancement never write the same key
//! concurrently.
//!
//! ## Gateway boundary
//!
//! All broker I/O goes through the `DataFeedGateway` trait behind a shared
//! `GatewayLimiter` and a single `RetryPolicy` abstraction; nothing else in
//! the workspace talks to the feed directly.

pub mod error;
pub mod gateway;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod testing;

pub use error::{FeedError, Result};
pub use gateway::{DataFeedGateway, GatewayLimiter};
pub use retry::{Retryable, RetryPolicy};
pub use scheduler::{
    CoverageReport, CoverageRequirement, UnmetCoverage, UnmetReason, WarmupEnhancementScheduler,
};
pub use store::CandleStore;
