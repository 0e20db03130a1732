//! Persistence manager: wires the append-only log and snapshot store to an
//! engine, owns startup recovery, and runs the two background tasks
//! (snapshot ticker, rewrite watcher) that keep the log bounded.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vectrix_core::{AOLRecord, CommandPayload, Engine};

use crate::aol::{AppendOnlyLog, SyncPolicy};
use crate::error::Result;
use crate::snapshot::SnapshotStore;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub data_dir: PathBuf,
    pub snapshot_filename: String,
    pub aol_filename: String,
    pub aol_sync: SyncPolicy,
    /// Minutes between snapshot ticks; `0` disables the ticker.
    pub snapshot_interval_minutes: u64,
    pub aol_rewrite_size_bytes: u64,
    pub backup_retention: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            snapshot_filename: "snapshot.bin".to_string(),
            aol_filename: "aol.bin".to_string(),
            aol_sync: SyncPolicy::EverySec,
            snapshot_interval_minutes: 0,
            aol_rewrite_size_bytes: 64 * 1024 * 1024,
            backup_retention: 7,
        }
    }
}

/// Elapsed time and record count from the most recent recovery pass, kept
/// for introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryStats {
    pub elapsed: Duration,
    pub records_applied: u64,
    pub snapshot_loaded: bool,
}

/// Orchestrates C5 (AOL) + C6 (snapshot store) against an `Engine`. Holds
/// no engine of its own in diagnostic mode — `attach_engine` binds one for
/// the mutation path and recovery to act against.
pub struct PersistenceManager {
    config: PersistenceConfig,
    aol: Mutex<AppendOnlyLog>,
    snapshot_store: SnapshotStore,
    engine: Arc<RwLock<Option<Engine>>>,
    cancellation: CancellationToken,
    snapshot_task: Mutex<Option<JoinHandle<()>>>,
    rewrite_task: Mutex<Option<JoinHandle<()>>>,
    last_recovery: Mutex<RecoveryStats>,
}

impl PersistenceManager {
    pub fn new(config: PersistenceConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let aol_path = config.data_dir.join(&config.aol_filename);
        let aol = AppendOnlyLog::open(&aol_path, config.aol_sync)?;
        let snapshot_store = SnapshotStore::new(&config.data_dir, &config.snapshot_filename)?;

        Ok(Self {
            config,
            aol: Mutex::new(aol),
            snapshot_store,
            engine: Arc::new(RwLock::new(None)),
            cancellation: CancellationToken::new(),
            snapshot_task: Mutex::new(None),
            rewrite_task: Mutex::new(None),
            last_recovery: Mutex::new(RecoveryStats::default()),
        })
    }

    /// Binds the engine this manager mutates/replays against. Without an
    /// attached engine, recovery runs in diagnostic mode: AOL records are
    /// counted but never applied.
    pub async fn attach_engine(&self, engine: Engine) {
        *self.engine.write().await = Some(engine);
    }

    pub fn engine_handle(&self) -> Arc<RwLock<Option<Engine>>> {
        Arc::clone(&self.engine)
    }

    /// Step 1: load+validate+restore the snapshot, if one exists. Step 2:
    /// replay the AOL, applying each record if an engine is attached
    /// (diagnostic mode otherwise just counts). Step 3: retain stats.
    pub async fn recover(&self) -> Result<RecoveryStats> {
        let start = Instant::now();
        let mut snapshot_loaded = false;

        if let Some(snapshot) = self.snapshot_store.load()? {
            let mut guard = self.engine.write().await;
            let engine = guard.get_or_insert_with(Engine::new);
            engine.restore_from(&snapshot)?;
            snapshot_loaded = true;
            info!(
                databases = snapshot.databases.len(),
                "restored engine state from snapshot"
            );
        }

        let aol = self.aol.lock().await;
        let mut engine_guard = self.engine.write().await;
        let records_applied = aol.replay(Some(&self.cancellation), |record| {
            if let Some(engine) = engine_guard.as_mut() {
                engine.apply_command(&record)?;
            }
            Ok(())
        })?;
        drop(engine_guard);
        drop(aol);

        let stats = RecoveryStats {
            elapsed: start.elapsed(),
            records_applied,
            snapshot_loaded,
        };
        *self.last_recovery.lock().await = stats;
        info!(
            elapsed_ms = stats.elapsed.as_millis() as u64,
            records_applied, snapshot_loaded, "recovery complete"
        );
        Ok(stats)
    }

    pub async fn last_recovery_stats(&self) -> RecoveryStats {
        *self.last_recovery.lock().await
    }

    /// Appends `record` to the AOL. Called after the corresponding mutation
    /// has already succeeded in memory; on failure the in-memory change is
    /// NOT rolled back, matching the availability-first tradeoff this store
    /// accepts (see `Engine::apply_command`'s caller contract).
    pub async fn append(&self, record: AOLRecord) -> Result<()> {
        self.aol.lock().await.append(&record)
    }

    pub async fn record_mutation(
        &self,
        db: Option<String>,
        collection: Option<String>,
        payload: CommandPayload,
    ) -> Result<()> {
        self.append(AOLRecord::new(now_millis(), db, collection, payload))
            .await
    }

    /// Captures engine state, saves it, then truncates the AOL. The
    /// truncation point is the log-compaction boundary: subsequent recovery
    /// only needs records appended after this snapshot.
    pub async fn snapshot_now(&self) -> Result<()> {
        let snapshot = {
            let guard = self.engine.read().await;
            match guard.as_ref() {
                Some(engine) => engine.capture_state(),
                None => return Ok(()),
            }
        };
        self.snapshot_store.save(&snapshot)?;
        self.aol.lock().await.truncate()?;
        self.snapshot_store
            .enforce_backup_retention(self.config.backup_retention)?;
        info!("snapshot saved and AOL truncated");
        Ok(())
    }

    /// Inspects the AOL file size; if it exceeds the configured threshold,
    /// asks the engine for its minimum reconstructing command sequence and
    /// rewrites the log to just that.
    pub async fn rewrite_if_oversized(&self) -> Result<bool> {
        let size = self.aol.lock().await.file_size()?;
        if size <= self.config.aol_rewrite_size_bytes {
            return Ok(false);
        }
        let commands = {
            let guard = self.engine.read().await;
            match guard.as_ref() {
                Some(engine) => engine.optimized_commands(),
                None => return Ok(false),
            }
        };
        self.aol.lock().await.rewrite(&commands)?;
        info!(
            record_count = commands.len(),
            "rewrote oversized AOL to its minimum reconstructing sequence"
        );
        Ok(true)
    }

    /// Spawns the snapshot ticker and rewrite watcher. A no-op if
    /// `snapshot_interval_minutes` is `0` and no tasks are running yet for
    /// the ticker; the rewrite watcher always runs (it watches file size,
    /// not a schedule the config can disable).
    pub fn start_background_tasks(self: &Arc<Self>) {
        if self.config.snapshot_interval_minutes > 0 {
            let manager = Arc::clone(self);
            let token = self.cancellation.clone();
            let interval = Duration::from_secs(self.config.snapshot_interval_minutes * 60);
            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = manager.snapshot_now().await {
                                warn!(error = %e, "scheduled snapshot failed, retrying next tick");
                            }
                        }
                    }
                }
            });
            // Uncontended at startup: no other call site locks `snapshot_task`
            // before this one returns.
            *self
                .snapshot_task
                .try_lock()
                .expect("snapshot_task uncontended at startup") = Some(handle);
        }

        let manager = Arc::clone(self);
        let token = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = manager.rewrite_if_oversized().await {
                            warn!(error = %e, "AOL rewrite check failed, retrying next tick");
                        }
                    }
                }
            }
        });
        *self
            .rewrite_task
            .try_lock()
            .expect("rewrite_task uncontended at startup") = Some(handle);
    }

    /// Cancels background tasks, awaits them, then flushes the AOL. Both
    /// tasks stop before the AOL is closed.
    pub async fn shutdown(&self) {
        self.cancellation.cancel();
        if let Some(handle) = self.snapshot_task.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.rewrite_task.lock().await.take() {
            let _ = handle.await;
        }
        if let Err(e) = self.aol.lock().await.flush_and_sync() {
            warn!(error = %e, "failed to flush AOL during shutdown");
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}
