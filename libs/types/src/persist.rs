//! Persisted snapshot envelope.
//!
//! Every state snapshot leaving the engine (trader memory, account health)
//! travels in this envelope so recovery code can check version and
//! provenance before touching the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current envelope schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Time spent producing the snapshot.
    pub latency_ms: u64,
    /// Completeness of the snapshotted state in [0, 1]; below 1.0 when some
    /// keys were degraded or skipped.
    pub completeness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot<T> {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    /// Producing component, e.g. `trader_memory` or `account_health`.
    pub source: String,
    pub payload: T,
    pub meta: SnapshotMeta,
}

impl<T> PersistedSnapshot<T> {
    pub fn new(source: impl Into<String>, payload: T, meta: SnapshotMeta) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            source: source.into(),
            payload,
            meta,
        }
    }
}
