//! Process wiring for Vectrix: configuration loading, logging bootstrap,
//! and the engine/persistence-manager pair that `main` drives through a
//! recovery-then-serve lifecycle.
//!
//! This crate exposes the same seams (`vectrix_persistence::PersistenceManager`,
//! its `engine_handle()`) an RPC transport crate would bind to; it does not
//! implement a server itself.

pub mod config;
pub mod error;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vectrix_core::Engine;
use vectrix_persistence::{PersistenceConfig, PersistenceManager, RecoveryStats};

pub use config::{LogFormat, VectrixConfig};
pub use error::CliError;

/// Initializes the global `tracing` subscriber from `logging.level` and
/// `logging.format`, matching the teacher's `tracing_subscriber::registry()
/// ...init()` bootstrap but driven by config instead of a hardcoded filter.
pub fn init_logging(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.as_filter_str().into());

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn persistence_config_from(cfg: &VectrixConfig) -> PersistenceConfig {
    PersistenceConfig {
        data_dir: cfg.persistence.data_dir.clone().into(),
        snapshot_filename: cfg.persistence.snapshot_filename.clone(),
        aol_filename: cfg.persistence.aol_filename.clone(),
        aol_sync: cfg.persistence.aol_sync.into(),
        snapshot_interval_minutes: cfg.persistence.snapshot_interval_minutes,
        aol_rewrite_size_bytes: cfg.persistence.aol_rewrite_size_mb * 1024 * 1024,
        backup_retention: cfg.persistence.backup_retention,
    }
}

/// Builds a `PersistenceManager` for `cfg`, attaches a fresh `Engine`, and
/// runs startup recovery (snapshot load, then AOL replay). Returns the
/// manager (with its background tasks not yet started — call
/// `start_background_tasks` once the caller is ready to run) and the
/// recovery stats for logging.
pub async fn bootstrap(
    cfg: &VectrixConfig,
) -> Result<(Arc<PersistenceManager>, RecoveryStats), CliError> {
    let manager =
        PersistenceManager::new(persistence_config_from(cfg)).map_err(CliError::Persistence)?;
    manager.attach_engine(Engine::new()).await;

    let stats = manager.recover().await.map_err(CliError::Recovery)?;

    Ok((Arc::new(manager), stats))
}
