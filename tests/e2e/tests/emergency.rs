//! Emergency-stop behavior through the assembled engine: halt sweeps,
//! submission blocking, and the explicit recovery path.

use e2e_fixtures::{eventually, fast_config, healthy_account, long_setup_tape, tape_end};
use engine::TradingEngine;
use execution::testing::MockExecutionGateway;
use market_data::testing::MockFeed;
use rust_decimal_macros::dec;
use std::sync::Arc;
use supervisor::testing::MockHealthSource;
use types::{
    AccountMetrics, EngineEvent, HaltReason, SignalState, Timeframe,
};

#[tokio::test]
async fn halt_cancels_live_signal_and_blocks_resubmission_until_reset() {
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
    let signals = engine.current_signals().await;
    let live = signals
        .iter()
        .find(|s| s.state == SignalState::Acknowledged)
        .expect("live signal before halt");
    let live_id = live.signal.id;
    let submissions_before_halt = gateway.submit_count();

    let mut events = engine.events();
    engine.force_emergency_stop();

    // The halt watcher sweeps the live (not yet filled) signal to
    // Cancelled.
    let cancelled = eventually(2_000, || async {
        engine
            .current_signals()
            .await
            .iter()
            .any(|s| s.signal.id == live_id && s.state == SignalState::Cancelled)
    })
    .await;
    assert!(cancelled, "halt sweep must cancel the live signal");

    // While halted, re-detection of the same setup is rejected before
    // submission: the gateway sees nothing new.
    engine.run_detection_pass().await;
    assert_eq!(gateway.submit_count(), submissions_before_halt);
    let health_halted = engine
        .current_signals()
        .await
        .iter()
        .filter(|s| s.state == SignalState::Rejected)
        .count();
    assert!(health_halted >= 1);

    let mut saw_halt_event = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, EngineEvent::EmergencyHalted { reason: HaltReason::OperatorRequested, .. }) {
            saw_halt_event = true;
        }
    }
    assert!(saw_halt_event);

    // Explicit reset; the condition (operator halt) has no active breach.
    engine.reset_after_recovery().unwrap();
    engine.run_detection_pass().await;
    let resubmitted = eventually(2_000, || async {
        gateway.submit_count() > submissions_before_halt
    })
    .await;
    assert!(resubmitted, "submissions must resume after explicit reset");

    engine.shutdown().await;
}

#[tokio::test]
async fn critical_drawdown_trips_supervisor_and_sweeps() {
    e2e_fixtures::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let feed = Arc::new(MockFeed::new());
    feed.set_series("EURUSD", Timeframe::M15, long_setup_tape(tape_end()));
    let gateway = Arc::new(MockExecutionGateway::new());
    let source = Arc::new(MockHealthSource::new(AccountMetrics {
        balance: dec!(10000),
        equity: dec!(10000),
        daily_loss: dec!(0),
        consecutive_losses: 0,
    }));

    let engine = TradingEngine::start(
        fast_config(dir.path()),
        feed,
        Arc::clone(&gateway) as _,
        Arc::clone(&source) as _,
    )
    .await
    .unwrap();

    engine.run_detection_pass().await;
    let live_exists = engine
        .current_signals()
        .await
        .iter()
        .any(|s| s.state == SignalState::Acknowledged);
    assert!(live_exists);

    // Account falls 12% under its peak; the supervision loop must trip and
    // the sweep must cancel the sized/acknowledged signal.
    source.set(AccountMetrics {
        balance: dec!(10000),
        equity: dec!(8800),
        daily_loss: dec!(1200),
        consecutive_losses: 2,
    });

    let swept = eventually(3_000, || async {
        engine
            .current_signals()
            .await
            .iter()
            .all(|s| s.state.is_terminal())
    })
    .await;
    assert!(swept, "all signals must reach a terminal state after the trip");
    assert!(engine.account_health().drawdown_pct > 0.10);

    // Reset is refused while the drawdown condition is still breached.
    assert!(engine.reset_after_recovery().is_err());

    engine.shutdown().await;
}
