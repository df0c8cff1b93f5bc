//! Engine assembly errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration invalid: {0}")]
    Config(#[from] config::ConfigError),

    #[error("trader memory recovery failed: {0}")]
    Memory(#[from] strategies::MemoryError),
}
