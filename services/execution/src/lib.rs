//! # Vigil Execution Service
//!
//! Drives accepted trading signals from validation through submission to
//! closure, under the emergency-stop supervisor's halt flag.
//!
//! ## Ownership rules
//!
//! - `SignalExecution` is the only holder of mutable signal lifecycle
//!   state; every mutation goes through the transition table in
//!   `types::SignalState` and lands in the transition history.
//! - Each execution sits behind its own `tokio::sync::Mutex`, so
//!   transitions for one signal are strictly sequential while distinct
//!   signals proceed in parallel.
//! - The halt flag is read-only here; it is checked before sizing and again
//!   immediately before submission, and a halt sweep force-cancels (or
//!   closes out) every non-terminal execution.
//!
//! ## Failure envelope
//!
//! Gateway submission uses the shared `RetryPolicy` with bounded backoff
//! and an overall submission timeout; transient errors retry, fatal errors
//! reject, and a timeout marks the signal `Rejected` pending gateway
//! reconciliation. Every terminal outcome carries a typed reason code.

pub mod error;
pub mod gateway;
pub mod sizer;
pub mod state_machine;
pub mod testing;
pub mod validator;

pub use error::{ExecutionError, GatewayError, SizingError};
pub use gateway::{ExecutionGateway, FillReport, FillState, OrderAck, OrderRequest};
pub use sizer::DynamicRiskSizer;
pub use state_machine::{ExecutionStateMachine, SignalSnapshot, TransitionRecord};
pub use validator::SignalValidator;
