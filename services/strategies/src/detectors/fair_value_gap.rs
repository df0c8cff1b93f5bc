//! Fair value gap detection.
//!
//! A three-candle displacement leaving a price void: in the bullish case
//! the first candle's high never trades against the third candle's low, so
//! the middle candle's range contains an unfilled gap that price tends to
//! revisit.

use super::{PatternDetector, BASELINE_WINDOW, SCAN_WINDOW};
use crate::error::DetectionError;
use crate::swing::average_body;
use config::DetectionConfig;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use types::{CandleSeries, DetectorKind, Direction, PatternInstance, PriceZone};

pub struct FairValueGapDetector {
    ttl_bars: u32,
}

impl FairValueGapDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            ttl_bars: config.candidate_ttl_bars,
        }
    }

    fn confidence(gap: Decimal, middle_body: Decimal) -> f64 {
        if middle_body.is_zero() {
            return 0.5;
        }
        let fill = (gap / middle_body).to_f64().unwrap_or(0.0).min(1.0);
        0.5 + 0.3 * fill
    }
}

impl PatternDetector for FairValueGapDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::FairValueGap
    }

    fn detect(&self, series: &CandleSeries) -> Result<Vec<PatternInstance>, DetectionError> {
        let bars = series.tail(SCAN_WINDOW);
        if bars.len() < BASELINE_WINDOW + 3 {
            return Err(DetectionError::InsufficientData {
                key: series.key.clone(),
                have: bars.len(),
                need: BASELINE_WINDOW + 3,
            });
        }

        let step = series.key.timeframe.duration();
        let mut found = Vec::new();

        for i in 2.max(BASELINE_WINDOW)..bars.len() {
            let first = &bars[i - 2];
            let middle = &bars[i - 1];
            let third = &bars[i];

            // Gaps only matter when carved by real displacement; a drifting
            // middle candle leaves no institutional footprint.
            let baseline = average_body(&bars[i - BASELINE_WINDOW..i.saturating_sub(1)]);
            if middle.body() < baseline {
                continue;
            }

            if first.high < third.low {
                let gap = third.low - first.high;
                found.push(PatternInstance {
                    detector: self.kind(),
                    symbol: series.key.symbol.clone(),
                    timeframe: series.key.timeframe,
                    direction: Direction::Long,
                    zone: PriceZone::new(first.high, third.low),
                    raw_confidence: Self::confidence(gap, middle.body()),
                    detected_at: third.open_time,
                    expires_at: third.open_time + step * self.ttl_bars as i32,
                });
            } else if first.low > third.high {
                let gap = first.low - third.high;
                found.push(PatternInstance {
                    detector: self.kind(),
                    symbol: series.key.symbol.clone(),
                    timeframe: series.key.timeframe,
                    direction: Direction::Short,
                    zone: PriceZone::new(third.high, first.low),
                    raw_confidence: Self::confidence(gap, middle.body()),
                    detected_at: third.open_time,
                    expires_at: third.open_time + step * self.ttl_bars as i32,
                });
            }
        }

        Ok(found)
    }
}
