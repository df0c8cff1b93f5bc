//! Dynamic position sizing.
//!
//! Base size is `risk_per_trade_pct × balance / stop_distance`, then damped
//! under elevated volatility and degraded account health, clamped to the
//! configured bounds. A size that cannot be expressed within bounds is
//! rejected, never silently clamped up into acceptability.

use crate::error::SizingError;
use config::RiskConfig;
use rust_decimal::Decimal;
use tracing::debug;
use types::{AccountHealthSnapshot, HealthBand, TradingSignal};

pub struct DynamicRiskSizer {
    config: RiskConfig,
}

impl DynamicRiskSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Compute the position size for a signal given current account health
    /// and the volatility ratio (current ATR-style measure over baseline).
    pub fn size(
        &self,
        signal: &TradingSignal,
        health: &AccountHealthSnapshot,
        volatility_ratio: f64,
    ) -> Result<Decimal, SizingError> {
        let stop_distance = signal.stop_distance();
        if stop_distance.is_zero() {
            return Err(SizingError::ZeroStopDistance);
        }

        let risk_pct =
            Decimal::try_from(self.config.risk_per_trade_pct).unwrap_or(Decimal::new(1, 2));
        let mut size = health.balance * risk_pct / stop_distance;

        let health_factor = match health.band {
            HealthBand::Normal => 1.0,
            HealthBand::Warning => self.config.warning_size_factor,
            HealthBand::Critical => self.config.critical_size_factor,
        };
        if health_factor < 1.0 {
            size *= Decimal::try_from(health_factor).unwrap_or(Decimal::ONE);
        }

        if volatility_ratio > self.config.volatility_damping_threshold {
            size *= Decimal::try_from(self.config.volatility_size_factor).unwrap_or(Decimal::ONE);
        }

        // Clamping down to max is fine; falling below min is not.
        if size > self.config.max_size {
            size = self.config.max_size;
        }
        if size < self.config.min_size {
            return Err(SizingError::Infeasible {
                computed: size,
                min_size: self.config.min_size,
            });
        }

        let size = size.round_dp(2);
        debug!(
            signal = %signal.id,
            %size,
            band = %health.band,
            volatility_ratio,
            "position sized"
        );
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use types::{Direction, SignalGrade, SignalId, Symbol, Timeframe};

    fn signal(stop_distance: Decimal) -> TradingSignal {
        TradingSignal {
            id: SignalId::new(),
            symbol: Symbol::new("EURUSD"),
            direction: Direction::Long,
            timeframe: Timeframe::M15,
            entry: dec!(1.1000) + stop_distance,
            stop: dec!(1.1000),
            targets: vec![dec!(1.2000)],
            composite_confidence: 0.8,
            grade: SignalGrade::A,
            contributing_patterns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn health(band: HealthBand) -> AccountHealthSnapshot {
        AccountHealthSnapshot {
            balance: dec!(10000),
            equity: dec!(10000),
            drawdown_pct: 0.0,
            consecutive_losses: 0,
            daily_loss: Decimal::ZERO,
            connectivity_ok: true,
            band,
            version: 1,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn base_size_follows_risk_formula() {
        let sizer = DynamicRiskSizer::new(RiskConfig::default());
        // 1% of 10_000 = 100 risk; 0.0050 stop distance -> 20_000 units,
        // clamped to max_size 5.00.
        let size = sizer
            .size(&signal(dec!(0.0050)), &health(HealthBand::Normal), 1.0)
            .unwrap();
        assert_eq!(size, RiskConfig::default().max_size);
    }

    #[test]
    fn warning_band_halves_size() {
        let mut config = RiskConfig::default();
        config.max_size = dec!(100000);
        let sizer = DynamicRiskSizer::new(config);
        let normal = sizer
            .size(&signal(dec!(0.0050)), &health(HealthBand::Normal), 1.0)
            .unwrap();
        let warning = sizer
            .size(&signal(dec!(0.0050)), &health(HealthBand::Warning), 1.0)
            .unwrap();
        assert_eq!(warning * dec!(2), normal);
    }

    #[test]
    fn critical_band_quarters_size() {
        let mut config = RiskConfig::default();
        config.max_size = dec!(100000);
        let sizer = DynamicRiskSizer::new(config);
        let normal = sizer
            .size(&signal(dec!(0.0050)), &health(HealthBand::Normal), 1.0)
            .unwrap();
        let critical = sizer
            .size(&signal(dec!(0.0050)), &health(HealthBand::Critical), 1.0)
            .unwrap();
        assert_eq!(critical * dec!(4), normal);
    }

    #[test]
    fn elevated_volatility_damps_size() {
        let mut config = RiskConfig::default();
        config.max_size = dec!(100000);
        let sizer = DynamicRiskSizer::new(config);
        let calm = sizer
            .size(&signal(dec!(0.0050)), &health(HealthBand::Normal), 1.0)
            .unwrap();
        let volatile = sizer
            .size(&signal(dec!(0.0050)), &health(HealthBand::Normal), 2.0)
            .unwrap();
        assert!(volatile < calm);
    }

    #[test]
    fn infeasible_size_rejected_not_clamped() {
        let mut config = RiskConfig::default();
        config.min_size = dec!(10);
        let sizer = DynamicRiskSizer::new(config);
        // Tiny balance, critical band, huge stop: size collapses below min.
        let mut account = health(HealthBand::Critical);
        account.balance = dec!(100);
        let err = sizer
            .size(&signal(dec!(0.0500)), &account, 3.0)
            .unwrap_err();
        assert!(matches!(err, SizingError::Infeasible { .. }));
    }

    #[test]
    fn zero_stop_distance_rejected() {
        let sizer = DynamicRiskSizer::new(RiskConfig::default());
        let err = sizer
            .size(&signal(Decimal::ZERO), &health(HealthBand::Normal), 1.0)
            .unwrap_err();
        assert_eq!(err, SizingError::ZeroStopDistance);
    }
}
