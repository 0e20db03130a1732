//! Error taxonomy for the durability subsystem. Composite over `CoreError`
//! (in-memory failures surfaced while applying a replayed command) plus the
//! disk-specific kinds the core crate has no knowledge of.

use thiserror::Error;
use vectrix_core::CoreError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode/decode error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("persistence operation failed: {0}")]
    PersistenceFailed(String),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("engine operation during recovery failed: {0}")]
    Engine(#[from] CoreError),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
