//! Volatility ratio for sizing: short-window true range over long-window
//! true range. A ratio above 1 means the market is livelier than its
//! recent baseline and the risk sizer damps position size accordingly.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use types::{Candle, CandleSeries};

const SHORT_WINDOW: usize = 14;
const LONG_WINDOW: usize = 50;

fn true_range(previous: &Candle, current: &Candle) -> Decimal {
    let hl = current.high - current.low;
    let hc = (current.high - previous.close).abs();
    let lc = (current.low - previous.close).abs();
    hl.max(hc).max(lc)
}

fn average_true_range(bars: &[Candle], window: usize) -> Option<Decimal> {
    if bars.len() < window + 1 {
        return None;
    }
    let tail = &bars[bars.len() - window - 1..];
    let total: Decimal = tail.windows(2).map(|w| true_range(&w[0], &w[1])).sum();
    Some(total / Decimal::from(window))
}

/// Current-over-baseline volatility. Returns 1.0 (neutral) when the series
/// is too short or degenerate to measure.
pub(crate) fn volatility_ratio(series: &CandleSeries) -> f64 {
    let bars = series.bars();
    let (Some(short), Some(long)) = (
        average_true_range(bars, SHORT_WINDOW),
        average_true_range(bars, LONG_WINDOW),
    ) else {
        return 1.0;
    };
    if long.is_zero() {
        return 1.0;
    }
    (short / long).to_f64().unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use types::{SeriesKey, Timeframe};

    fn series(ranges: &[Decimal]) -> CandleSeries {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        let bars = ranges
            .iter()
            .enumerate()
            .map(|(i, range)| {
                let mid = dec!(1.1000);
                Candle {
                    open_time: start + Duration::minutes(15 * i as i64),
                    open: mid,
                    high: mid + range / dec!(2),
                    low: mid - range / dec!(2),
                    close: mid,
                    volume: dec!(100),
                }
            })
            .collect();
        CandleSeries::from_bars(SeriesKey::new("EURUSD", Timeframe::M15), bars).unwrap()
    }

    #[test]
    fn short_series_is_neutral() {
        let s = series(&vec![dec!(0.0010); 20]);
        assert_eq!(volatility_ratio(&s), 1.0);
    }

    #[test]
    fn steady_ranges_are_neutral() {
        let s = series(&vec![dec!(0.0010); 80]);
        assert!((volatility_ratio(&s) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn recent_expansion_raises_ratio() {
        let mut ranges = vec![dec!(0.0010); 66];
        ranges.extend(vec![dec!(0.0040); 14]);
        let s = series(&ranges);
        assert!(volatility_ratio(&s) > 1.5);
    }
}
