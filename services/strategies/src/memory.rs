//! Trader memory: persistent, queryable outcome history per pattern key.
//!
//! `record_outcome` is the only mutation path and is serialized per key
//! through the map entry, so concurrent trade closures for the same key
//! never lose updates. Snapshots travel in the shared `PersistedSnapshot`
//! envelope and restore must reproduce identical `success_rate` and
//! `sample_count` for every key.

use crate::error::MemoryError;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use types::{PatternKey, PersistedSnapshot, SnapshotMeta, TraderMemoryRecord, SNAPSHOT_VERSION};

/// Snapshot payload: every record, order-independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPayload {
    pub records: Vec<TraderMemoryRecord>,
}

/// Concurrent outcome memory store.
pub struct TraderMemoryStore {
    records: DashMap<PatternKey, TraderMemoryRecord>,
    window_capacity: usize,
}

impl TraderMemoryStore {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            records: DashMap::new(),
            window_capacity: window_capacity.max(1),
        }
    }

    /// Record one trade outcome for a pattern key. Creates the record on
    /// first occurrence; never deletes. Returns the updated record for
    /// event reporting.
    pub fn record_outcome(&self, key: &PatternKey, success: bool) -> TraderMemoryRecord {
        let now = Utc::now();
        let mut entry = self
            .records
            .entry(key.clone())
            .or_insert_with(|| TraderMemoryRecord::new(key.clone(), self.window_capacity, now));
        entry.value_mut().record(success, now);
        debug!(
            pattern_key = %key,
            success,
            success_rate = entry.value().success_rate,
            sample_count = entry.value().sample_count,
            "outcome recorded"
        );
        entry.value().clone()
    }

    /// Windowed success rate and lifetime sample count for a key, if any
    /// outcome was ever recorded.
    pub fn success_rate(&self, key: &PatternKey) -> Option<(f64, u64)> {
        self.records
            .get(key)
            .map(|r| (r.success_rate, r.sample_count))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consistent snapshot of every record in the persistence envelope.
    pub fn snapshot(&self) -> PersistedSnapshot<MemoryPayload> {
        let started = Instant::now();
        let mut records: Vec<TraderMemoryRecord> =
            self.records.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| a.pattern_key.to_string().cmp(&b.pattern_key.to_string()));
        PersistedSnapshot::new(
            "trader_memory",
            MemoryPayload { records },
            SnapshotMeta {
                latency_ms: started.elapsed().as_millis() as u64,
                completeness: 1.0,
            },
        )
    }

    /// Replace the in-memory state from a snapshot. Called once at startup
    /// before the engine accepts signals.
    pub fn restore(&self, snapshot: PersistedSnapshot<MemoryPayload>) -> Result<(), MemoryError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(MemoryError::VersionMismatch {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        self.records.clear();
        let count = snapshot.payload.records.len();
        for record in snapshot.payload.records {
            self.records.insert(record.pattern_key.clone(), record);
        }
        info!(records = count, "trader memory restored from snapshot");
        Ok(())
    }

    /// Persist the current snapshot as JSON via write-temp-then-rename, so
    /// a crash mid-write never corrupts the previous snapshot.
    pub fn persist_to(&self, path: impl AsRef<Path>) -> Result<(), MemoryError> {
        let path = path.as_ref();
        let io_err = |source| MemoryError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_vec_pretty(&self.snapshot())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        debug!(path = %path.display(), records = self.len(), "trader memory persisted");
        Ok(())
    }

    /// Load the latest snapshot from disk, if one exists.
    pub fn load_from(
        path: impl AsRef<Path>,
    ) -> Result<Option<PersistedSnapshot<MemoryPayload>>, MemoryError> {
        let path = path.as_ref();
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(MemoryError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let snapshot = serde_json::from_slice(&raw)?;
        Ok(Some(snapshot))
    }
}
