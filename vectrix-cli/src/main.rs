//! Vectrix process entry point.
//!
//! Loads configuration, initializes logging, restores durable state
//! (snapshot + AOL replay), starts the snapshot/rewrite background tasks,
//! then waits for a shutdown signal. No transport is bound here; this
//! binary demonstrates and exercises the durability lifecycle that an RPC
//! crate would otherwise wrap.

use vectrix_cli::{bootstrap, init_logging, CliError};

const CONFIG_PATH_ENV: &str = "VECTRIX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "vectrix.toml";

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "vectrix-cli exiting with error");
            err.exit_code()
        }
    };
    std::process::exit(exit_code);
}

async fn run() -> Result<(), CliError> {
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = vectrix_cli::config::load(Some(&config_path))?;

    init_logging(&cfg.logging);
    tracing::info!(data_dir = %cfg.persistence.data_dir, "starting vectrix-cli");

    let (manager, stats) = bootstrap(&cfg).await?;
    tracing::info!(
        elapsed_ms = stats.elapsed.as_millis() as u64,
        records_applied = stats.records_applied,
        snapshot_loaded = stats.snapshot_loaded,
        "recovery complete"
    );

    manager.start_background_tasks();
    tracing::info!("background snapshot/rewrite tasks started, awaiting shutdown signal");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal, shutting down anyway");
    }

    tracing::info!("shutdown signal received");
    manager.shutdown().await;
    tracing::info!("vectrix-cli shutdown complete");

    Ok(())
}
