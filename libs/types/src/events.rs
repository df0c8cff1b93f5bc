//! Engine event stream payloads.
//!
//! Events are observational: consumers (dashboard, journal, metrics) may lag
//! or drop them without affecting engine correctness. Every terminal signal
//! transition, suppression, halt, and coverage degradation is reported here
//! with its reason.

use crate::account::HaltReason;
use crate::market::SeriesKey;
use crate::pattern::PatternKey;
use crate::signal::{RejectReason, SignalId, SignalState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    SignalCreated {
        id: SignalId,
        symbol: String,
        composite_confidence: f64,
        at: DateTime<Utc>,
    },
    SignalStateChanged {
        id: SignalId,
        from: SignalState,
        to: SignalState,
        reason: Option<RejectReason>,
        at: DateTime<Utc>,
    },
    /// A candidate was dropped by the memory floor before ever becoming a
    /// signal.
    CandidateSuppressed {
        pattern_key: PatternKey,
        success_rate: f64,
        floor: f64,
        at: DateTime<Utc>,
    },
    OutcomeRecorded {
        pattern_key: PatternKey,
        success: bool,
        success_rate: f64,
        sample_count: u64,
        at: DateTime<Utc>,
    },
    CoverageDegraded {
        key: SeriesKey,
        completeness_ratio: f64,
        at: DateTime<Utc>,
    },
    EmergencyHalted {
        reason: HaltReason,
        at: DateTime<Utc>,
    },
    HaltCleared {
        at: DateTime<Utc>,
    },
}
