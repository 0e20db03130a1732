//! Error taxonomy shared by the index, collection, database and engine layers.

use thiserror::Error;

use crate::types::VectorId;

/// Errors raised by in-memory operations (index, collection, database, engine).
///
/// Persistence-layer errors (`PersistenceFailed`, `CorruptedData`,
/// `RecoveryFailed`) live in `vectrix-persistence` and wrap this type via
/// `#[source]` rather than the other way around, since the core crate has no
/// knowledge of disk I/O.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index operation failed: {0}")]
    IndexOperationFailed(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    pub fn duplicate_id(id: VectorId) -> Self {
        CoreError::AlreadyExists(format!("vector id {id}"))
    }

    pub fn vector_not_found(id: VectorId) -> Self {
        CoreError::NotFound(format!("vector id {id}"))
    }

    pub fn database_not_found(name: &str) -> Self {
        CoreError::NotFound(format!("database '{name}'"))
    }

    pub fn collection_not_found(name: &str) -> Self {
        CoreError::NotFound(format!("collection '{name}'"))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
