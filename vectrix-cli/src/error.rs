//! Top-level error type, used only to pick a process exit code.

use thiserror::Error;
use vectrix_core::CoreError;
use vectrix_persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration invalid: {0}")]
    Config(#[from] config::ConfigError),

    #[error("configuration invalid: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("recovery failed: {0}")]
    Recovery(#[source] PersistenceError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Maps an error to the process exit code spec'd for this binary:
    /// `0` success, `1` unexpected error, `2` configuration invalid,
    /// `3` recovery failed.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Validation(_) => 2,
            CliError::Recovery(_) => 3,
            CliError::Persistence(_) | CliError::Core(_) | CliError::Other(_) => 1,
        }
    }
}
