//! Property tests over config validation: in-range values always pass,
//! out-of-range values always fail, regardless of where in the range they
//! fall.

use config::EngineConfig;
use proptest::prelude::*;
use rust_decimal::Decimal;

proptest! {
    #[test]
    fn memory_floor_in_unit_interval_accepted(floor in 0.0f64..=1.0) {
        let mut config = EngineConfig::default();
        config.confluence.memory_floor = floor;
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn memory_floor_outside_unit_interval_rejected(floor in 1.0001f64..10.0) {
        let mut config = EngineConfig::default();
        config.confluence.memory_floor = floor;
        prop_assert!(config.validate().is_err());
    }

    #[test]
    fn htf_multiplier_above_cap_rejected(excess in 0.0001f64..5.0) {
        let mut config = EngineConfig::default();
        config.confluence.htf_multiplier = config.confluence.htf_multiplier_max + excess;
        prop_assert!(config.validate().is_err());
    }

    #[test]
    fn htf_multiplier_within_bounds_accepted(m in 1.0f64..=1.5) {
        let mut config = EngineConfig::default();
        config.confluence.htf_multiplier = m;
        config.confluence.htf_multiplier_max = 1.5;
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_size_bounds_rejected(min in 1i64..1000, extra in 1i64..1000) {
        let mut config = EngineConfig::default();
        config.risk.max_size = Decimal::new(min, 2);
        config.risk.min_size = Decimal::new(min + extra, 2);
        prop_assert!(config.validate().is_err());
    }

    #[test]
    fn risk_per_trade_outside_band_rejected(pct in 0.1001f64..1.0) {
        let mut config = EngineConfig::default();
        config.risk.risk_per_trade_pct = pct;
        prop_assert!(config.validate().is_err());
    }
}
