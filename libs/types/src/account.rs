//! Account health and emergency-halt state.
//!
//! Both types here are single-writer: only the emergency-stop supervisor
//! produces them, and every other service reads versioned snapshots off a
//! watch channel. Readers never observe a partially updated snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw account metrics as fetched from the broker-facing health source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMetrics {
    pub balance: Decimal,
    pub equity: Decimal,
    /// Realized loss since the daily rollover, non-negative.
    pub daily_loss: Decimal,
    pub consecutive_losses: u32,
}

/// Health severity band computed from configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBand {
    Normal,
    Warning,
    Critical,
}

impl fmt::Display for HealthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthBand::Normal => f.write_str("normal"),
            HealthBand::Warning => f.write_str("warning"),
            HealthBand::Critical => f.write_str("critical"),
        }
    }
}

/// Versioned account health snapshot published by the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountHealthSnapshot {
    pub balance: Decimal,
    pub equity: Decimal,
    /// Drawdown from balance peak as a fraction in [0, 1].
    pub drawdown_pct: f64,
    pub consecutive_losses: u32,
    pub daily_loss: Decimal,
    pub connectivity_ok: bool,
    pub band: HealthBand,
    /// Monotonically increasing per supervisor evaluation.
    pub version: u64,
    pub generated_at: DateTime<Utc>,
}

impl AccountHealthSnapshot {
    /// Placeholder snapshot used before the first supervisor evaluation.
    pub fn startup() -> Self {
        Self {
            balance: Decimal::ZERO,
            equity: Decimal::ZERO,
            drawdown_pct: 0.0,
            consecutive_losses: 0,
            daily_loss: Decimal::ZERO,
            connectivity_ok: false,
            band: HealthBand::Normal,
            version: 0,
            generated_at: Utc::now(),
        }
    }
}

/// Why the fleet was halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    DrawdownCritical,
    ConsecutiveLossLimit,
    DailyLossLimit,
    ConnectivityLost,
    OperatorRequested,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HaltReason::DrawdownCritical => "drawdown_critical",
            HaltReason::ConsecutiveLossLimit => "consecutive_loss_limit",
            HaltReason::DailyLossLimit => "daily_loss_limit",
            HaltReason::ConnectivityLost => "connectivity_lost",
            HaltReason::OperatorRequested => "operator_requested",
        };
        f.write_str(s)
    }
}

/// Fleet-wide halt flag. `Halted` blocks sizing and submission everywhere;
/// recovery back to `Clear` requires the trip condition to clear AND an
/// explicit reset, never an automatic resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltState {
    Clear,
    Halted {
        reason: HaltReason,
        since: DateTime<Utc>,
    },
}

impl HaltState {
    pub fn is_halted(&self) -> bool {
        matches!(self, HaltState::Halted { .. })
    }

    pub fn reason(&self) -> Option<HaltReason> {
        match self {
            HaltState::Halted { reason, .. } => Some(*reason),
            HaltState::Clear => None,
        }
    }
}
