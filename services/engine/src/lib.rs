//! # Vigil Trading Engine - Coordination Hub
//!
//! Owns the lifecycle of every subsystem and wires the data flow:
//!
//! ```text
//! DataFeedGateway → CandleStore → PatternDetectionPanel → ConfluenceEngine
//!        ↓              ↓                                        ↓
//!   Warm-up SLA    Enhancement loop      TraderMemoryStore ← outcomes
//!                                                 ↓
//!                              SignalValidator → RiskSizer → StateMachine
//!                                                 ↑              ↕
//!                                   EmergencyStopSupervisor ⟷ halt sweep
//! ```
//!
//! Startup order is fixed: restore trader memory, prime account health, run
//! the SLA-bounded warm-up, then spawn the supervised background tasks
//! (enhancement, detection-scoring, supervision, halt reaction, fill
//! reconciliation, periodic persistence). Shutdown cancels every task
//! through one `CancellationToken` and persists state before returning.
//!
//! Consumers get read-only accessors plus the event stream; the only
//! inbound commands are `force_emergency_stop` and `reset_after_recovery`.

mod counters;
mod engine;
mod error;
mod volatility;

pub use counters::{CountersSnapshot, PerformanceCounters};
pub use engine::TradingEngine;
pub use error::EngineError;
