//! Break of structure detection.
//!
//! A close beyond the most recent confirmed swing extreme in the direction
//! of the move. Not a zone — a structural confirmation that the confluence
//! engine and validator require alongside a zone pattern.

use super::{PatternDetector, BASELINE_WINDOW, SCAN_WINDOW};
use crate::error::DetectionError;
use crate::swing::{average_body, swing_highs, swing_lows};
use config::DetectionConfig;
use rust_decimal::prelude::ToPrimitive;
use types::{CandleSeries, DetectorKind, Direction, PatternInstance, PriceZone};

pub struct BreakOfStructureDetector {
    swing_lookback: usize,
    ttl_bars: u32,
}

impl BreakOfStructureDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            swing_lookback: config.swing_lookback,
            ttl_bars: config.candidate_ttl_bars,
        }
    }
}

impl PatternDetector for BreakOfStructureDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::BreakOfStructure
    }

    fn detect(&self, series: &CandleSeries) -> Result<Vec<PatternInstance>, DetectionError> {
        let bars = series.tail(SCAN_WINDOW);
        let need = (self.swing_lookback * 2 + 2).max(BASELINE_WINDOW);
        if bars.len() < need {
            return Err(DetectionError::InsufficientData {
                key: series.key.clone(),
                have: bars.len(),
                need,
            });
        }

        let last = bars.last().expect("non-empty tail");
        let structure = &bars[..bars.len() - 1];
        let baseline = average_body(&bars[bars.len().saturating_sub(BASELINE_WINDOW)..]);
        let step = series.key.timeframe.duration();
        let mut found = Vec::new();

        if let Some(swing) = swing_highs(structure, self.swing_lookback).last() {
            if last.close > swing.price {
                let margin = last.close - swing.price;
                let strength = if baseline.is_zero() {
                    0.0
                } else {
                    (margin / baseline).to_f64().unwrap_or(0.0).min(1.0)
                };
                found.push(PatternInstance {
                    detector: self.kind(),
                    symbol: series.key.symbol.clone(),
                    timeframe: series.key.timeframe,
                    direction: Direction::Long,
                    zone: PriceZone::new(swing.price, last.close),
                    raw_confidence: 0.55 + 0.25 * strength,
                    detected_at: last.open_time,
                    expires_at: last.open_time + step * self.ttl_bars as i32,
                });
            }
        }

        if let Some(swing) = swing_lows(structure, self.swing_lookback).last() {
            if last.close < swing.price {
                let margin = swing.price - last.close;
                let strength = if baseline.is_zero() {
                    0.0
                } else {
                    (margin / baseline).to_f64().unwrap_or(0.0).min(1.0)
                };
                found.push(PatternInstance {
                    detector: self.kind(),
                    symbol: series.key.symbol.clone(),
                    timeframe: series.key.timeframe,
                    direction: Direction::Short,
                    zone: PriceZone::new(last.close, swing.price),
                    raw_confidence: 0.55 + 0.25 * strength,
                    detected_at: last.open_time,
                    expires_at: last.open_time + step * self.ttl_bars as i32,
                });
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use types::{Candle, SeriesKey, Timeframe};

    fn series_breaking_high() -> CandleSeries {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let mut bars = Vec::new();
        for i in 0..24 {
            let (high, low, close) = if i == 12 {
                (dec!(1.1030), dec!(1.1004), dec!(1.1010))
            } else {
                (dec!(1.1012), dec!(1.1000), dec!(1.1006))
            };
            bars.push(Candle {
                open_time: start + Duration::minutes(15 * i),
                open: dec!(1.1004),
                high,
                low,
                close,
                volume: Decimal::ONE_HUNDRED,
            });
        }
        // Final bar closes through the 1.1030 swing high.
        bars.push(Candle {
            open_time: start + Duration::minutes(15 * 24),
            open: dec!(1.1010),
            high: dec!(1.1042),
            low: dec!(1.1008),
            close: dec!(1.1040),
            volume: Decimal::ONE_HUNDRED,
        });
        CandleSeries::from_bars(SeriesKey::new("EURUSD", Timeframe::M15), bars).unwrap()
    }

    #[test]
    fn close_through_swing_high_is_bullish_bos() {
        let detector = BreakOfStructureDetector::new(&DetectionConfig::default());
        let found = detector.detect(&series_breaking_high()).unwrap();

        let bos = found
            .iter()
            .find(|p| p.direction == Direction::Long)
            .expect("bullish break of structure");
        assert_eq!(bos.zone.low, dec!(1.1030));
        assert_eq!(bos.zone.high, dec!(1.1040));
        assert!(bos.raw_confidence >= 0.55);
        assert!(!bos.detector.is_zone());
    }

    #[test]
    fn no_break_without_close_beyond_swing() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let bars: Vec<Candle> = (0..25)
            .map(|i| Candle {
                open_time: start + Duration::minutes(15 * i),
                open: dec!(1.1004),
                high: if i == 12 { dec!(1.1030) } else { dec!(1.1012) },
                low: dec!(1.1000),
                close: dec!(1.1006),
                volume: Decimal::ONE_HUNDRED,
            })
            .collect();
        let series =
            CandleSeries::from_bars(SeriesKey::new("EURUSD", Timeframe::M15), bars).unwrap();

        let detector = BreakOfStructureDetector::new(&DetectionConfig::default());
        let found = detector.detect(&series).unwrap();
        assert!(found.iter().all(|p| p.direction != Direction::Long));
    }
}
