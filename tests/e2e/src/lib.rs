//! Shared fixtures for the e2e suite: engineered candle tapes and engine
//! assembly helpers.

use chrono::{DateTime, Duration, Utc};
use config::{CoverageEntry, EngineConfig};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::Arc;
use std::sync::Once;
use supervisor::testing::MockHealthSource;
use types::{AccountMetrics, Candle, Timeframe};

static TRACING: Once = Once::new();

/// Install a test subscriber once per process; `RUST_LOG` filters apply.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A 60-bar M15 tape engineered to fire the full long pipeline:
///
/// - quiet two-pip bodies establish a low displacement baseline;
/// - bar 54 prints a confirmed swing high at 1.1010;
/// - bar 58 is the last bearish candle (the order block, 1.1000–1.1009);
/// - bar 59 is a bullish displacement closing at 1.1030, breaking the
///   swing high.
///
/// The order block zone and the break-of-structure zone sit within merge
/// tolerance, so confluence emits one long signal carrying both a zone and
/// a structure confirmation — enough to clear the validator.
pub fn long_setup_tape(end: DateTime<Utc>) -> Vec<Candle> {
    let step = Timeframe::M15.duration();
    let mut bars = Vec::with_capacity(60);
    for i in 0..60 {
        let open_time = end - step * (60 - i as i32);
        let bar = match i {
            54 => Candle {
                open_time,
                open: dec!(1.1004),
                high: dec!(1.1010),
                low: dec!(1.1003),
                close: dec!(1.1006),
                volume: dec!(180),
            },
            58 => Candle {
                open_time,
                open: dec!(1.1008),
                high: dec!(1.1009),
                low: dec!(1.1000),
                close: dec!(1.1002),
                volume: dec!(220),
            },
            59 => Candle {
                open_time,
                open: dec!(1.1002),
                high: dec!(1.1032),
                low: dec!(1.1001),
                close: dec!(1.1030),
                volume: dec!(900),
            },
            _ => Candle {
                open_time,
                open: dec!(1.1004),
                high: dec!(1.1007),
                low: dec!(1.1003),
                close: dec!(1.1006),
                volume: dec!(150),
            },
        };
        bars.push(bar);
    }
    bars
}

/// Engine config tuned for tests: tight loop intervals, generous rate
/// limits, snapshot files under `dir`.
pub fn fast_config(dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.warmup.deadline_ms = 5_000;
    config.warmup.retry_delay_ms = 20;
    config.warmup.critical = vec![CoverageEntry {
        symbol: "EURUSD".into(),
        timeframe: Timeframe::M15,
        bars: 50,
    }];
    config.gateway.rate_limit_per_sec = 10_000;
    // Scenario tests drive detection passes explicitly; park the interval
    // loop so admissions stay deterministic.
    config.detection.interval_ms = 3_600_000;
    config.enhancement.tick_interval_ms = 10;
    config.enhancement.backoff_base_ms = 5;
    config.enhancement.backoff_max_ms = 20;
    config.emergency.eval_interval_ms = 40;
    config.execution.fill_poll_interval_ms = 15;
    config.execution.submit_backoff_base_ms = 1;
    config.execution.submit_backoff_max_ms = 5;
    config.memory.snapshot_interval_ms = 100;
    config.memory.snapshot_path = dir.join("trader_memory.json");
    config
}

/// Health source reporting a calm, solvent account.
pub fn healthy_account() -> Arc<MockHealthSource> {
    Arc::new(MockHealthSource::new(AccountMetrics {
        balance: dec!(10000),
        equity: dec!(10000),
        daily_loss: Decimal::ZERO,
        consecutive_losses: 0,
    }))
}

/// Retry an async probe until it returns true or the budget runs out.
/// Keeps e2e tests sleep-light without hard-coding loop cadences.
pub async fn eventually<F, Fut>(budget_ms: u64, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(budget_ms);
    loop {
        if probe().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

/// End timestamp aligned so the engineered tape sits just behind "now".
pub fn tape_end() -> DateTime<Utc> {
    Utc::now() + Duration::minutes(1)
}
