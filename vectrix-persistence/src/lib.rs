//! Durability layer for Vectrix: an append-only command log (AOL), a
//! snapshot store, and a manager orchestrating both against a
//! `vectrix_core::Engine` with scheduled snapshotting and log rewriting.
//!
//! Recovery order on startup is snapshot-then-replay: load the newest
//! snapshot if one exists, then replay every AOL record appended after it.
//! A corrupted snapshot or a truncated/malformed AOL record aborts recovery
//! rather than silently dropping data (see `PersistenceError::CorruptedData`
//! and `AppendOnlyLog::replay`'s byte-offset error reporting).

pub mod aol;
pub mod error;
pub mod manager;
pub mod snapshot;

pub use aol::{AppendOnlyLog, SyncPolicy};
pub use error::{PersistenceError, Result};
pub use manager::{PersistenceConfig, PersistenceManager, RecoveryStats};
pub use snapshot::SnapshotStore;
