//! The pattern detection panel.
//!
//! A fixed, explicitly registered set of detectors runs against read-only
//! candle snapshots. Registration is static — no reflection, no dynamic
//! discovery; swapping a detector means swapping its registration here.

mod break_of_structure;
mod fair_value_gap;
mod liquidity_grab;
mod order_block;

pub use break_of_structure::BreakOfStructureDetector;
pub use fair_value_gap::FairValueGapDetector;
pub use liquidity_grab::LiquidityGrabDetector;
pub use order_block::OrderBlockDetector;

use crate::error::DetectionError;
use config::DetectionConfig;
use tracing::{debug, warn};
use types::{CandleSeries, DetectorKind, PatternInstance};

/// Window of trailing bars each detector scans. Anything older has expired
/// from candidate relevance long before this horizon.
pub(crate) const SCAN_WINDOW: usize = 60;

/// Bars used to establish the average-body displacement baseline.
pub(crate) const BASELINE_WINDOW: usize = 20;

/// One pattern detector: a pure function over a candle-series snapshot.
///
/// Implementations must not hold mutable state across calls; the panel may
/// invoke them concurrently for different `(symbol, timeframe)` snapshots.
pub trait PatternDetector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    fn detect(&self, series: &CandleSeries) -> Result<Vec<PatternInstance>, DetectionError>;
}

/// The registered detector set, run in order against each snapshot.
pub struct PatternDetectionPanel {
    detectors: Vec<Box<dyn PatternDetector>>,
    min_bars: usize,
}

impl PatternDetectionPanel {
    /// Panel with the standard four order-flow detectors.
    pub fn with_default_detectors(config: &DetectionConfig) -> Self {
        Self {
            detectors: vec![
                Box::new(OrderBlockDetector::new(config)),
                Box::new(FairValueGapDetector::new(config)),
                Box::new(LiquidityGrabDetector::new(config)),
                Box::new(BreakOfStructureDetector::new(config)),
            ],
            min_bars: config.min_bars,
        }
    }

    /// Custom registration, used by tests to isolate a detector.
    pub fn with_detectors(detectors: Vec<Box<dyn PatternDetector>>, min_bars: usize) -> Self {
        Self {
            detectors,
            min_bars,
        }
    }

    pub fn detector_kinds(&self) -> Vec<DetectorKind> {
        self.detectors.iter().map(|d| d.kind()).collect()
    }

    /// Run every detector against the snapshot, isolating failures: a
    /// detector error is logged and skipped, never propagated.
    pub fn detect_all(&self, series: &CandleSeries) -> Vec<PatternInstance> {
        if series.len() < self.min_bars {
            debug!(
                key = %series.key,
                bars = series.len(),
                min_bars = self.min_bars,
                "snapshot below detection minimum, skipping"
            );
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for detector in &self.detectors {
            match detector.detect(series) {
                Ok(mut found) => candidates.append(&mut found),
                Err(err) => {
                    warn!(
                        detector = %detector.kind(),
                        key = %series.key,
                        error = %err,
                        "detector failed, continuing panel"
                    );
                }
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use market_data::testing::synthetic_candles;
    use rust_decimal::Decimal;
    use types::{CandleSeries, SeriesKey, Timeframe};

    struct FailingDetector;

    impl PatternDetector for FailingDetector {
        fn kind(&self) -> DetectorKind {
            DetectorKind::OrderBlock
        }

        fn detect(&self, series: &CandleSeries) -> Result<Vec<PatternInstance>, DetectionError> {
            Err(DetectionError::DegenerateSeries {
                key: series.key.clone(),
                reason: "always fails".into(),
            })
        }
    }

    fn snapshot(bars: usize) -> CandleSeries {
        CandleSeries::from_bars(
            SeriesKey::new("EURUSD", Timeframe::M15),
            synthetic_candles(Timeframe::M15, bars, Utc::now(), Decimal::new(110_000, 5)),
        )
        .unwrap()
    }

    #[test]
    fn failing_detector_does_not_abort_panel() {
        let config = DetectionConfig::default();
        let panel = PatternDetectionPanel::with_detectors(
            vec![
                Box::new(FailingDetector),
                Box::new(BreakOfStructureDetector::new(&config)),
            ],
            config.min_bars,
        );
        // Must not panic or propagate; the healthy detector still runs.
        let _ = panel.detect_all(&snapshot(60));
    }

    #[test]
    fn short_snapshot_yields_no_candidates() {
        let config = DetectionConfig::default();
        let panel = PatternDetectionPanel::with_default_detectors(&config);
        assert!(panel.detect_all(&snapshot(10)).is_empty());
    }

    #[test]
    fn default_panel_registers_all_four_detectors() {
        let config = DetectionConfig::default();
        let panel = PatternDetectionPanel::with_default_detectors(&config);
        let kinds = panel.detector_kinds();
        assert_eq!(kinds.len(), 4);
        assert!(kinds.contains(&DetectorKind::OrderBlock));
        assert!(kinds.contains(&DetectorKind::FairValueGap));
        assert!(kinds.contains(&DetectorKind::LiquidityGrab));
        assert!(kinds.contains(&DetectorKind::BreakOfStructure));
    }
}
