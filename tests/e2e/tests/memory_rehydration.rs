//! Outcome memory across engine restarts: repeated losses push a pattern
//! key under the success-rate floor, persistence carries that history
//! through a restart, and the re-hydrated engine suppresses the setup it
//! previously traded.

use e2e_fixtures::{eventually, fast_config, healthy_account, long_setup_tape, tape_end};
use engine::TradingEngine;
use execution::testing::MockExecutionGateway;
use execution::FillState;
use market_data::testing::MockFeed;
use rust_decimal_macros::dec;
use std::sync::Arc;
use types::{EngineEvent, SignalState, Timeframe};

#[tokio::test]
async fn losing_history_survives_restart_and_suppresses_the_setup() {
    e2e_fixtures::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let memory_min_samples = fast_config(dir.path()).confluence.memory_min_samples;

    // ---- Run 1: trade the same setup into the ground. -------------------
    {
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

        for round in 0..memory_min_samples {
            engine.run_detection_pass().await;
            let signals = engine.current_signals().await;
            let live = signals
                .iter()
                .find(|s| s.state == SignalState::Acknowledged)
                .unwrap_or_else(|| panic!("round {round}: no live signal"));
            let id = live.signal.id;
            let order_id = live.order_id.clone().expect("acknowledged order id");

            gateway.set_fill(&order_id, FillState::Filled, Some(dec!(1.1030)), dec!(1));
            let filled = eventually(2_000, || async {
                engine
                    .current_signals()
                    .await
                    .iter()
                    .any(|s| s.signal.id == id && s.state == SignalState::Filled)
            })
            .await;
            assert!(filled, "round {round}: fill never reconciled");

            // Exit below entry: every contributing pattern records a loss.
            engine.close_signal(id, dec!(1.0990)).await.unwrap();
        }

        let snapshot = engine.pattern_memory_snapshot();
        for record in &snapshot.payload.records {
            assert_eq!(record.sample_count, memory_min_samples);
            assert_eq!(record.success_rate, 0.0);
        }
        engine.shutdown().await;
    }

    // ---- Run 2: fresh process, same snapshot directory. -----------------
    {
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

        // Memory was re-hydrated with identical statistics before any
        // signal could be accepted.
        let snapshot = engine.pattern_memory_snapshot();
        assert!(!snapshot.payload.records.is_empty());
        for record in &snapshot.payload.records {
            assert_eq!(record.sample_count, memory_min_samples);
            assert_eq!(record.success_rate, 0.0);
        }

        // The once-traded setup is now suppressed: no admission, no order.
        let mut events = engine.events();
        engine.run_detection_pass().await;
        assert_eq!(gateway.submit_count(), 0);
        assert!(engine.current_signals().await.is_empty());

        let mut saw_suppression = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::CandidateSuppressed { .. }) {
                saw_suppression = true;
            }
        }
        assert!(saw_suppression, "suppression must surface on the event stream");

        engine.shutdown().await;
    }
}
