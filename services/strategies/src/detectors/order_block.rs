//! Order block detection.
//!
//! An order block is the last opposing candle before a displacement move:
//! the zone where institutional orders are presumed to rest. A bullish
//! displacement promotes the last bearish candle before it into a demand
//! zone; mirrored for bearish displacement.

use super::{PatternDetector, BASELINE_WINDOW, SCAN_WINDOW};
use crate::error::DetectionError;
use crate::swing::{average_body, is_displacement};
use config::DetectionConfig;
use rust_decimal::prelude::ToPrimitive;
use types::{CandleSeries, DetectorKind, Direction, PatternInstance, PriceZone};

pub struct OrderBlockDetector {
    displacement_factor: f64,
    ttl_bars: u32,
}

impl OrderBlockDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            displacement_factor: config.displacement_factor,
            ttl_bars: config.candidate_ttl_bars,
        }
    }
}

impl PatternDetector for OrderBlockDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::OrderBlock
    }

    fn detect(&self, series: &CandleSeries) -> Result<Vec<PatternInstance>, DetectionError> {
        let bars = series.tail(SCAN_WINDOW);
        if bars.len() < BASELINE_WINDOW + 2 {
            return Err(DetectionError::InsufficientData {
                key: series.key.clone(),
                have: bars.len(),
                need: BASELINE_WINDOW + 2,
            });
        }

        let step = series.key.timeframe.duration();
        let mut found = Vec::new();

        for i in BASELINE_WINDOW..bars.len() {
            let baseline = average_body(&bars[i - BASELINE_WINDOW..i]);
            if !is_displacement(&bars[i], baseline, self.displacement_factor) {
                continue;
            }

            let direction = if bars[i].is_bullish() {
                Direction::Long
            } else {
                Direction::Short
            };

            // Last opposing candle before the displacement bar is the block.
            let Some(block_idx) = (0..i).rev().find(|&j| match direction {
                Direction::Long => bars[j].is_bearish(),
                Direction::Short => bars[j].is_bullish(),
            }) else {
                continue;
            };
            let block = &bars[block_idx];

            let body_ratio = (bars[i].body() / baseline).to_f64().unwrap_or(0.0);
            let raw_confidence =
                (0.55 + 0.08 * (body_ratio - self.displacement_factor)).clamp(0.50, 0.90);

            found.push(PatternInstance {
                detector: self.kind(),
                symbol: series.key.symbol.clone(),
                timeframe: series.key.timeframe,
                direction,
                zone: PriceZone::new(block.low, block.high),
                raw_confidence,
                detected_at: bars[i].open_time,
                expires_at: bars[i].open_time + step * self.ttl_bars as i32,
            });
        }

        Ok(found)
    }
}
