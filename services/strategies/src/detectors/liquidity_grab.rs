//! Liquidity grab detection.
//!
//! A sweep beyond a prior swing extreme that closes back inside the range:
//! resting stops above the old high (or below the old low) get taken, then
//! price rejects. The rejection wick is the footprint.

use super::{PatternDetector, SCAN_WINDOW};
use crate::error::DetectionError;
use crate::swing::{swing_highs, swing_lows};
use config::DetectionConfig;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use types::{Candle, CandleSeries, DetectorKind, Direction, PatternInstance, PriceZone};

/// How many trailing bars are checked as potential sweep bars.
const SWEEP_WINDOW: usize = 3;

pub struct LiquidityGrabDetector {
    swing_lookback: usize,
    ttl_bars: u32,
}

impl LiquidityGrabDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            swing_lookback: config.swing_lookback,
            ttl_bars: config.candidate_ttl_bars,
        }
    }

    fn rejection_confidence(bar: &Candle, beyond: Decimal) -> f64 {
        let range = bar.range();
        if range.is_zero() {
            return 0.5;
        }
        let wick_share = (beyond / range).to_f64().unwrap_or(0.0).min(1.0);
        0.5 + 0.35 * wick_share
    }
}

impl PatternDetector for LiquidityGrabDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::LiquidityGrab
    }

    fn detect(&self, series: &CandleSeries) -> Result<Vec<PatternInstance>, DetectionError> {
        let bars = series.tail(SCAN_WINDOW);
        let need = self.swing_lookback * 2 + 1 + SWEEP_WINDOW;
        if bars.len() < need {
            return Err(DetectionError::InsufficientData {
                key: series.key.clone(),
                have: bars.len(),
                need,
            });
        }

        let step = series.key.timeframe.duration();
        let sweep_start = bars.len() - SWEEP_WINDOW;
        // Swing structure is established strictly before the sweep window.
        let structure = &bars[..sweep_start];
        let highs = swing_highs(structure, self.swing_lookback);
        let lows = swing_lows(structure, self.swing_lookback);

        let mut found = Vec::new();
        for bar in bars.iter().skip(sweep_start) {
            // Buy-side sweep: poke above an old high, close back under it.
            for swing in highs.iter().rev().take(2) {
                if bar.high > swing.price && bar.close < swing.price {
                    found.push(PatternInstance {
                        detector: self.kind(),
                        symbol: series.key.symbol.clone(),
                        timeframe: series.key.timeframe,
                        direction: Direction::Short,
                        zone: PriceZone::new(swing.price, bar.high),
                        raw_confidence: Self::rejection_confidence(bar, bar.high - swing.price),
                        detected_at: bar.open_time,
                        expires_at: bar.open_time + step * self.ttl_bars as i32,
                    });
                    break;
                }
            }
            // Sell-side sweep, mirrored.
            for swing in lows.iter().rev().take(2) {
                if bar.low < swing.price && bar.close > swing.price {
                    found.push(PatternInstance {
                        detector: self.kind(),
                        symbol: series.key.symbol.clone(),
                        timeframe: series.key.timeframe,
                        direction: Direction::Long,
                        zone: PriceZone::new(bar.low, swing.price),
                        raw_confidence: Self::rejection_confidence(bar, swing.price - bar.low),
                        detected_at: bar.open_time,
                        expires_at: bar.open_time + step * self.ttl_bars as i32,
                    });
                    break;
                }
            }
        }

        Ok(found)
    }
}
