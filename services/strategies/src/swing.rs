//! Swing-point and displacement helpers shared by the detectors.

use rust_decimal::Decimal;
use types::Candle;

/// A confirmed swing extreme: bar index plus the extreme price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SwingPoint {
    pub index: usize,
    pub price: Decimal,
}

/// Swing highs: bars whose high strictly exceeds every high within
/// `lookback` bars on both sides. The trailing `lookback` bars can never be
/// confirmed and are skipped.
pub(crate) fn swing_highs(bars: &[Candle], lookback: usize) -> Vec<SwingPoint> {
    swing_points(bars, lookback, |c| c.high, |a, b| a > b)
}

/// Swing lows, mirror of `swing_highs`.
pub(crate) fn swing_lows(bars: &[Candle], lookback: usize) -> Vec<SwingPoint> {
    swing_points(bars, lookback, |c| c.low, |a, b| a < b)
}

fn swing_points(
    bars: &[Candle],
    lookback: usize,
    price: impl Fn(&Candle) -> Decimal,
    beats: impl Fn(Decimal, Decimal) -> bool,
) -> Vec<SwingPoint> {
    if bars.len() < lookback * 2 + 1 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for i in lookback..bars.len() - lookback {
        let candidate = price(&bars[i]);
        let confirmed = (i - lookback..i + lookback + 1)
            .filter(|j| *j != i)
            .all(|j| beats(candidate, price(&bars[j])));
        if confirmed {
            out.push(SwingPoint {
                index: i,
                price: candidate,
            });
        }
    }
    out
}

/// Mean candle body over a window, used to normalize displacement.
pub(crate) fn average_body(bars: &[Candle]) -> Decimal {
    if bars.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = bars.iter().map(|c| c.body()).sum();
    total / Decimal::from(bars.len())
}

/// Displacement test: the bar's body dwarfs the trailing average body by at
/// least `factor`.
pub(crate) fn is_displacement(bar: &Candle, baseline_body: Decimal, factor: f64) -> bool {
    if baseline_body.is_zero() {
        return false;
    }
    let factor = Decimal::try_from(factor).unwrap_or(Decimal::TWO);
    bar.body() >= baseline_body * factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(minute: u32, low: Decimal, high: Decimal) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2025, 6, 2, 10, minute, 0).unwrap(),
            open: low + (high - low) / dec!(4),
            high,
            low,
            close: high - (high - low) / dec!(4),
            volume: dec!(100),
        }
    }

    #[test]
    fn finds_isolated_swing_high() {
        let bars = vec![
            bar(0, dec!(1.0), dec!(1.2)),
            bar(1, dec!(1.0), dec!(1.3)),
            bar(2, dec!(1.0), dec!(1.8)), // swing high
            bar(3, dec!(1.0), dec!(1.4)),
            bar(4, dec!(1.0), dec!(1.2)),
        ];
        let highs = swing_highs(&bars, 2);
        assert_eq!(highs.len(), 1);
        assert_eq!(highs[0].index, 2);
        assert_eq!(highs[0].price, dec!(1.8));
    }

    #[test]
    fn trailing_bars_are_unconfirmed() {
        let bars = vec![
            bar(0, dec!(1.0), dec!(1.2)),
            bar(1, dec!(1.0), dec!(1.3)),
            bar(2, dec!(1.0), dec!(1.4)),
            bar(3, dec!(1.0), dec!(1.5)),
            bar(4, dec!(1.0), dec!(1.9)), // highest, but unconfirmed
        ];
        assert!(swing_highs(&bars, 2).is_empty());
    }

    #[test]
    fn displacement_requires_nonzero_baseline() {
        let bar = bar(0, dec!(1.0), dec!(2.0));
        assert!(!is_displacement(&bar, Decimal::ZERO, 1.8));
        assert!(is_displacement(&bar, dec!(0.1), 1.8));
    }
}
