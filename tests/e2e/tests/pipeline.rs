//! Full pipeline: engineered tape → warm-up → detection → confluence →
//! validation → sizing → submission → fill → closure → memory update.

use assert_matches::assert_matches;
use e2e_fixtures::{eventually, fast_config, healthy_account, long_setup_tape, tape_end};
use engine::TradingEngine;
use execution::testing::MockExecutionGateway;
use execution::FillState;
use market_data::testing::MockFeed;
use rust_decimal_macros::dec;
use std::sync::Arc;
use types::{Direction, EngineEvent, SignalState, Timeframe};

#[tokio::test]
async fn tape_to_acknowledged_signal_and_memory_update() {
    e2e_fixtures::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let feed = Arc::new(MockFeed::new());
    feed.set_series("EURUSD", Timeframe::M15, long_setup_tape(tape_end()));
    let gateway = Arc::new(MockExecutionGateway::new());

    let engine = TradingEngine::start(
        fast_config(dir.path()),
        Arc::clone(&feed) as _,
        Arc::clone(&gateway) as _,
        healthy_account(),
    )
    .await
    .unwrap();
    assert!(engine.warmup_report().fully_ready());

    let mut events = engine.events();
    engine.run_detection_pass().await;

    // One long signal reached the gateway and was acknowledged.
    let signals = engine.current_signals().await;
    let active = signals
        .iter()
        .find(|s| s.state == SignalState::Acknowledged)
        .expect("acknowledged signal");
    assert_eq!(active.signal.direction, Direction::Long);
    assert_eq!(active.signal.symbol.as_str(), "EURUSD");
    assert!(active.size.is_some());
    assert!(active.order_id.is_some());
    // Both a zone pattern and a structure confirmation contributed.
    assert!(active.signal.contributing_patterns.iter().any(|k| k.detector.is_zone()));
    assert!(active
        .signal
        .contributing_patterns
        .iter()
        .any(|k| !k.detector.is_zone()));
    assert!(gateway.submit_count() >= 1);

    // The event stream reported creation and the acknowledged transition.
    let mut saw_created = false;
    let mut saw_acknowledged = false;
    while let Ok(event) = events.try_recv() {
        match event {
            EngineEvent::SignalCreated { .. } => saw_created = true,
            EngineEvent::SignalStateChanged {
                to: SignalState::Acknowledged,
                ..
            } => saw_acknowledged = true,
            _ => {}
        }
    }
    assert!(saw_created && saw_acknowledged);

    // Gateway fills; the reconciliation loop picks it up.
    let id = active.signal.id;
    let contributing = active.signal.contributing_patterns.clone();
    let order_id = active.order_id.clone().unwrap();
    gateway.set_fill(&order_id, FillState::Filled, Some(dec!(1.1031)), dec!(1));
    let filled = eventually(2_000, || async {
        engine
            .current_signals()
            .await
            .iter()
            .any(|s| s.signal.id == id && s.state == SignalState::Filled)
    })
    .await;
    assert!(filled, "fill reconciliation never landed");

    // Close at a profit; every contributing key records a win.
    let state = engine.close_signal(id, dec!(1.1085)).await.unwrap();
    assert_eq!(state, SignalState::Closed);
    let memory = engine.pattern_memory_snapshot();
    for key in &contributing {
        let record = memory
            .payload
            .records
            .iter()
            .find(|r| &r.pattern_key == key)
            .expect("memory record per contributing key");
        assert_eq!(record.sample_count, 1);
        assert_eq!(record.success_rate, 1.0);
    }

    engine.shutdown().await;
}

#[tokio::test]
async fn duplicate_setups_are_not_readmitted_while_live() {
    e2e_fixtures::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let feed = Arc::new(MockFeed::new());
    feed.set_series("EURUSD", Timeframe::M15, long_setup_tape(tape_end()));
    let gateway = Arc::new(MockExecutionGateway::new());

    let engine = TradingEngine::start(
        fast_config(dir.path()),
        feed,
        Arc::clone(&gateway) as _,
        healthy_account(),
    )
    .await
    .unwrap();

    engine.run_detection_pass().await;
    engine.run_detection_pass().await;
    engine.run_detection_pass().await;

    let signals = engine.current_signals().await;
    let acknowledged = signals
        .iter()
        .filter(|s| s.state == SignalState::Acknowledged)
        .count();
    assert_eq!(acknowledged, 1, "same setup must not stack orders");
    assert_eq!(gateway.submit_count(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn transient_gateway_errors_retry_to_acknowledged() {
    e2e_fixtures::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let feed = Arc::new(MockFeed::new());
    feed.set_series("EURUSD", Timeframe::M15, long_setup_tape(tape_end()));
    let gateway = Arc::new(MockExecutionGateway::new());
    // Two transient failures, success on the third (max attempts) try.
    gateway.fail_submissions(2);

    let engine = TradingEngine::start(
        fast_config(dir.path()),
        feed,
        Arc::clone(&gateway) as _,
        healthy_account(),
    )
    .await
    .unwrap();
    engine.run_detection_pass().await;

    let signals = engine.current_signals().await;
    assert_matches!(
        signals
            .iter()
            .find(|s| s.state == SignalState::Acknowledged),
        Some(_)
    );
    assert_eq!(gateway.submit_count(), 3);

    engine.shutdown().await;
}
