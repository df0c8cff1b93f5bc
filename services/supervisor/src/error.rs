//! Supervisor error types.

use thiserror::Error;
use types::HaltReason;

/// Account-health source failures. Treated as connectivity loss, not as a
/// crash: the supervisor keeps evaluating on stale numbers and trips the
/// connectivity condition if the outage persists.
#[derive(Debug, Error)]
pub enum HealthSourceError {
    #[error("account health source unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Why a recovery reset was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResetError {
    #[error("reset refused: supervisor is not halted")]
    NotHalted,

    #[error("reset refused: {reason} is still breached")]
    ConditionStillBreached { reason: HaltReason },
}
