//! Error types for the execution service.

use market_data::Retryable;
use rust_decimal::Decimal;
use thiserror::Error;
use types::{HaltReason, RejectReason, SignalId, SignalState};

/// Execution-gateway errors, split along the retry boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transient hiccup (connectivity, throttling); retried with backoff.
    #[error("transient execution gateway error: {reason}")]
    Transient { reason: String },

    /// Permanent rejection; the signal goes to `Rejected` immediately.
    #[error("execution gateway rejected order: {reason}")]
    Fatal { reason: String },
}

impl Retryable for GatewayError {
    fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transient { .. })
    }
}

/// Sizing failures. Infeasible risk is terminal for the signal — it is
/// rejected, never silently clamped into acceptability.
#[derive(Debug, Error, PartialEq)]
pub enum SizingError {
    #[error("position size {computed} below minimum {min_size}")]
    Infeasible { computed: Decimal, min_size: Decimal },

    #[error("stop distance is zero, risk cannot be derived")]
    ZeroStopDistance,
}

/// State machine operation errors.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("unknown signal {id}")]
    UnknownSignal { id: SignalId },

    #[error("illegal transition for {id}: {from} -> {to}")]
    IllegalTransition {
        id: SignalId,
        from: SignalState,
        to: SignalState,
    },

    #[error("signal {id} rejected: {reason}")]
    Validation { id: SignalId, reason: RejectReason },

    #[error("signal {id} sizing failed: {source}")]
    Sizing {
        id: SignalId,
        #[source]
        source: SizingError,
    },

    #[error("emergency halt active ({reason}), signal {id} cancelled")]
    Halted { id: SignalId, reason: HaltReason },

    #[error("signal {id} submission failed: {source}")]
    Gateway {
        id: SignalId,
        #[source]
        source: GatewayError,
    },

    #[error("signal {id} submission timed out after {timeout_ms}ms")]
    SubmissionTimeout { id: SignalId, timeout_ms: u64 },
}
