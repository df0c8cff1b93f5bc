//! Warm-up SLA and enhancement degradation through the assembled engine.

use e2e_fixtures::{eventually, fast_config, healthy_account, long_setup_tape, tape_end};
use engine::TradingEngine;
use execution::testing::MockExecutionGateway;
use config::CoverageEntry;
use market_data::testing::MockFeed;
use std::sync::Arc;
use std::time::Instant;
use types::{EngineEvent, SeriesKey, Timeframe};

#[tokio::test]
async fn warmup_meets_sla_with_responsive_gateway() {
    e2e_fixtures::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let feed = Arc::new(MockFeed::new());
    feed.preload("EURUSD", Timeframe::M15, 250);
    let mut config = fast_config(dir.path());
    config.warmup.critical = vec![CoverageEntry {
        symbol: "EURUSD".into(),
        timeframe: Timeframe::M15,
        bars: 200,
    }];
    config.warmup.deadline_ms = 2_000;

    let started = Instant::now();
    let engine = TradingEngine::start(
        config,
        feed,
        Arc::new(MockExecutionGateway::new()),
        healthy_account(),
    )
    .await
    .unwrap();

    assert!(engine.warmup_report().fully_ready());
    assert!(started.elapsed().as_millis() < 2_000);
    let key = SeriesKey::new("EURUSD", Timeframe::M15);
    assert!(engine.candle_snapshot(&key).unwrap().len() >= 200);

    engine.shutdown().await;
}

#[tokio::test]
async fn exhausted_enhancement_marks_key_degraded_and_reports_it() {
    e2e_fixtures::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let feed = Arc::new(MockFeed::new());
    feed.set_series("EURUSD", Timeframe::M15, long_setup_tape(tape_end()));
    // GBPUSD H1 exists but the feed keeps failing it.
    feed.preload("GBPUSD", Timeframe::H1, 10);
    feed.fail_next("GBPUSD", Timeframe::H1, 1_000);

    let mut config = fast_config(dir.path());
    config.enhancement.targets = vec![CoverageEntry {
        symbol: "GBPUSD".into(),
        timeframe: Timeframe::H1,
        bars: 500,
    }];

    let engine = TradingEngine::start(
        config,
        feed,
        Arc::new(MockExecutionGateway::new()),
        healthy_account(),
    )
    .await
    .unwrap();

    let mut events = engine.events();
    let key = SeriesKey::new("GBPUSD", Timeframe::H1);

    let degraded_event = eventually(5_000, || {
        let mut found = false;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::CoverageDegraded { key: k, .. } = event {
                if k == key {
                    found = true;
                }
            }
        }
        async move { found }
    })
    .await;
    assert!(degraded_event, "degraded coverage must surface as an event");

    // Visible in completeness metadata, not hidden.
    let snapshot = engine.candle_snapshot(&key).expect("best-effort series kept");
    assert!(snapshot.degraded);

    let counters = engine.performance_counters();
    assert!(counters.coverage_degraded >= 1);

    engine.shutdown().await;
}
