//! # Vigil Centralized Configuration
//!
//! Every numeric threshold the engine consults — confidence floors,
//! timeframe multipliers, drawdown bands, retry counts, sizing bounds —
//! lives here, loaded from TOML and validated before any subsystem starts.
//! Nothing in the services hard-codes a tunable.
//!
//! Validation is strict: an inverted band or out-of-range factor fails
//! `EngineConfig::validate` with the offending field named, rather than
//! surfacing later as a silent misbehavior in scoring or sizing.

mod engine;
mod error;

pub use engine::{
    CloseOutMode, ConfluenceConfig, CoverageEntry, DetectionConfig, EmergencyConfig,
    EngineConfig, EnhancementConfig, ExecutionConfig, GatewayConfig, MemoryConfig, RiskConfig,
    ValidationConfig, WarmupConfig,
};
pub use error::ConfigError;
