//! Error types for detection and memory persistence.

use thiserror::Error;
use types::SeriesKey;

/// Detector-local failures. One failing detector never aborts the panel;
/// the panel logs the error and keeps going.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("insufficient data for {key}: {have} bars, need {need}")]
    InsufficientData {
        key: SeriesKey,
        have: usize,
        need: usize,
    },

    /// Series content defeats the detector's normalization (e.g. all-doji
    /// tail with zero average body).
    #[error("degenerate series for {key}: {reason}")]
    DegenerateSeries { key: SeriesKey, reason: String },
}

/// Trader memory persistence failures.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory snapshot I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("memory snapshot serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unsupported snapshot version {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}
