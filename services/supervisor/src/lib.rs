//! # Vigil Emergency Stop Supervisor
//!
//! Watches account health and system connectivity on a fixed interval and
//! owns the fleet-wide halt flag. Both the health snapshot and the halt
//! state are single-writer watch channels: the supervisor is the only
//! writer, every other service reads versioned, atomically-swapped values.
//!
//! Tripping is automatic; recovery is not. `reset_after_recovery` succeeds
//! only when the most recent evaluation shows every trip condition cleared
//! AND the call is explicit — the supervisor never resumes silently, so a
//! flapping condition cannot oscillate the fleet.

mod error;
mod supervisor;
pub mod testing;

pub use error::{HealthSourceError, ResetError};
pub use supervisor::{AccountHealthSource, EmergencyStopSupervisor};
