//! Trading signals and their lifecycle vocabulary.
//!
//! `TradingSignal` is the *immutable* description emitted by the confluence
//! engine. The mutable lifecycle (state, order id, attempts) lives in the
//! execution service's `SignalExecution`, which is the only place allowed to
//! advance `SignalState`. Keeping the description and the lifecycle in
//! separate types makes the single-writer rule structural instead of a
//! convention.

use crate::market::{Symbol, Timeframe};
use crate::pattern::{Direction, PatternKey};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique signal identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(Uuid);

impl SignalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Quality grade derived from composite confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalGrade {
    C,
    B,
    A,
}

impl fmt::Display for SignalGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalGrade::A => f.write_str("A"),
            SignalGrade::B => f.write_str("B"),
            SignalGrade::C => f.write_str("C"),
        }
    }
}

/// Execution lifecycle states.
///
/// Legal flow:
/// `PendingValidation → Sized → Submitted → {Acknowledged | Rejected} →
/// {Filled | PartiallyFilled | Cancelled} → Closed`, with emergency halt
/// preempting any non-terminal state into `Cancelled` (or close-out when
/// already filled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalState {
    PendingValidation,
    Sized,
    Submitted,
    Acknowledged,
    Rejected,
    Filled,
    PartiallyFilled,
    Cancelled,
    Closed,
}

impl SignalState {
    /// Terminal states are immutable and archived.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SignalState::Rejected | SignalState::Cancelled | SignalState::Closed
        )
    }

    /// True once the position has (at least partially) filled and a halt
    /// must go through the close-out path rather than a plain cancel.
    pub fn is_filled(&self) -> bool {
        matches!(self, SignalState::Filled | SignalState::PartiallyFilled)
    }

    /// Transition table. Every state mutation in the execution service goes
    /// through this check; anything outside the table is a typed error at
    /// the caller.
    pub fn can_transition_to(&self, next: SignalState) -> bool {
        use SignalState::*;
        matches!(
            (self, next),
            (PendingValidation, Sized)
                | (PendingValidation, Rejected)
                | (PendingValidation, Cancelled)
                | (Sized, Submitted)
                | (Sized, Rejected)
                | (Sized, Cancelled)
                | (Submitted, Acknowledged)
                | (Submitted, Rejected)
                | (Submitted, Cancelled)
                | (Acknowledged, Filled)
                | (Acknowledged, PartiallyFilled)
                | (Acknowledged, Cancelled)
                | (PartiallyFilled, Filled)
                | (PartiallyFilled, Closed)
                | (PartiallyFilled, Cancelled)
                | (Filled, Closed)
        )
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalState::PendingValidation => "pending_validation",
            SignalState::Sized => "sized",
            SignalState::Submitted => "submitted",
            SignalState::Acknowledged => "acknowledged",
            SignalState::Rejected => "rejected",
            SignalState::Filled => "filled",
            SignalState::PartiallyFilled => "partially_filled",
            SignalState::Cancelled => "cancelled",
            SignalState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Reason codes for signal rejection. Every rejection names the rule that
/// failed; a generic failure is never reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Emergency stop is active; no new submissions.
    HaltActive,
    /// Composite confidence below the configured minimum.
    ConfidenceBelowMinimum,
    /// Risk:reward to the first target below the configured minimum.
    RiskRewardBelowMinimum,
    /// No break-of-structure contribution among the pattern keys.
    MissingStructureConfirmation,
    /// No supporting zone pattern (order block / FVG / liquidity grab).
    MissingZoneConfirmation,
    /// Stop is on the wrong side of entry for the direction.
    StopOnWrongSide,
    /// Signal carries no targets.
    NoTargets,
    /// A contributing pattern key sits below the memory success-rate floor.
    MemoryFloorBreached,
    /// Risk could not be expressed within the configured size bounds.
    SizingInfeasible,
    /// Execution gateway permanently rejected the order.
    GatewayRejected,
    /// Submission retries exhausted or timed out.
    SubmissionTimeout,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::HaltActive => "halt_active",
            RejectReason::ConfidenceBelowMinimum => "confidence_below_minimum",
            RejectReason::RiskRewardBelowMinimum => "risk_reward_below_minimum",
            RejectReason::MissingStructureConfirmation => "missing_structure_confirmation",
            RejectReason::MissingZoneConfirmation => "missing_zone_confirmation",
            RejectReason::StopOnWrongSide => "stop_on_wrong_side",
            RejectReason::NoTargets => "no_targets",
            RejectReason::MemoryFloorBreached => "memory_floor_breached",
            RejectReason::SizingInfeasible => "sizing_infeasible",
            RejectReason::GatewayRejected => "gateway_rejected",
            RejectReason::SubmissionTimeout => "submission_timeout",
        };
        f.write_str(s)
    }
}

/// Immutable, scored signal emitted by the confluence engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub id: SignalId,
    pub symbol: Symbol,
    pub direction: Direction,
    /// Timeframe of the primary (highest-confidence) contributing pattern.
    pub timeframe: Timeframe,
    pub entry: Decimal,
    pub stop: Decimal,
    /// Profit targets ordered nearest-first.
    pub targets: Vec<Decimal>,
    /// Confluence-weighted, memory-adjusted confidence in [0, 1].
    pub composite_confidence: f64,
    pub grade: SignalGrade,
    /// Every pattern key that contributed to this signal; outcomes are
    /// recorded against each on closure.
    pub contributing_patterns: Vec<PatternKey>,
    pub created_at: DateTime<Utc>,
}

impl TradingSignal {
    /// Distance from entry to stop; always positive for a well-formed signal.
    pub fn stop_distance(&self) -> Decimal {
        (self.entry - self.stop).abs()
    }

    /// Risk:reward ratio to the nearest target, if any.
    pub fn risk_reward(&self) -> Option<Decimal> {
        let risk = self.stop_distance();
        if risk.is_zero() {
            return None;
        }
        self.targets
            .first()
            .map(|t| ((*t - self.entry).abs()) / risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        use SignalState::*;
        for terminal in [Rejected, Cancelled, Closed] {
            for next in [
                PendingValidation,
                Sized,
                Submitted,
                Acknowledged,
                Rejected,
                Filled,
                PartiallyFilled,
                Cancelled,
                Closed,
            ] {
                assert!(
                    !terminal.can_transition_to(next),
                    "{terminal} must not transition to {next}"
                );
            }
        }
    }

    #[test]
    fn happy_path_is_legal() {
        use SignalState::*;
        let path = [
            PendingValidation,
            Sized,
            Submitted,
            Acknowledged,
            Filled,
            Closed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]));
        }
    }

    #[test]
    fn skipping_submission_is_illegal() {
        assert!(!SignalState::Sized.can_transition_to(SignalState::Acknowledged));
        assert!(!SignalState::PendingValidation.can_transition_to(SignalState::Submitted));
    }
}
