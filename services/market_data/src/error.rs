//! Error types for the market data service.

use crate::retry::Retryable;
use thiserror::Error;
use types::{CandleError, SeriesKey};

/// Result type alias for market data operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Data-feed gateway and candle pipeline errors.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Gateway connection lost or unreachable.
    #[error("data feed disconnected: {reason}")]
    Disconnected { reason: String },

    /// Gateway throttled the request.
    #[error("data feed rate limited")]
    RateLimited,

    /// Symbol unknown to the feed; permanently excludes the key.
    #[error("invalid symbol: {symbol}")]
    InvalidSymbol { symbol: String },

    /// Request exceeded the configured fetch timeout.
    #[error("data feed request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Gateway returned a payload that failed candle validation.
    #[error("malformed candle data for {key}: {source}")]
    Malformed {
        key: SeriesKey,
        #[source]
        source: CandleError,
    },

    /// The feed answered but coverage is still short of the requirement.
    /// Recoverable; retried with a widened window.
    #[error("data unavailable for {key}: {bars_present}/{bars_needed} bars")]
    DataUnavailable {
        key: SeriesKey,
        bars_present: usize,
        bars_needed: usize,
    },
}

impl FeedError {
    /// All gateway errors are recoverable by retry except `InvalidSymbol`.
    pub fn is_recoverable(&self) -> bool {
        !self.is_permanent()
    }

    /// Permanent failures exclude the key from warm-up and enhancement.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FeedError::InvalidSymbol { .. })
    }
}

impl Retryable for FeedError {
    fn is_retryable(&self) -> bool {
        self.is_recoverable()
    }
}
