//! Snapshot store: atomic full-state serialization of the engine to a
//! single binary file, plus timestamped backups.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use vectrix_core::{Snapshot, SNAPSHOT_VERSION};

use crate::error::{PersistenceError, Result};

/// Manages the canonical snapshot file, its `temp/` write-staging
/// directory, and its `backups/` directory, all rooted at `data_dir`.
pub struct SnapshotStore {
    canonical_path: PathBuf,
    temp_dir: PathBuf,
    backups_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>, snapshot_filename: &str) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let temp_dir = data_dir.join("temp");
        let backups_dir = data_dir.join("backups");
        fs::create_dir_all(data_dir)?;
        fs::create_dir_all(&temp_dir)?;
        fs::create_dir_all(&backups_dir)?;
        Ok(Self {
            canonical_path: data_dir.join(snapshot_filename),
            temp_dir,
            backups_dir,
        })
    }

    pub fn canonical_path(&self) -> &Path {
        &self.canonical_path
    }

    /// Writes `snap` to a temp file under `temp/`, fsyncs, then atomically
    /// renames it over the canonical path. Never partially overwrites an
    /// existing snapshot: the rename either fully replaces it or the
    /// original is untouched and the temp file is the only casualty.
    pub fn save(&self, snap: &Snapshot) -> Result<()> {
        let bytes = bincode::serialize(snap)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.temp_dir)?;
        use std::io::Write;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.canonical_path)
            .map_err(|e| PersistenceError::PersistenceFailed(e.to_string()))?;
        Ok(())
    }

    /// Returns `None` if the canonical file does not exist; otherwise
    /// decodes and validates it.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.canonical_path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.canonical_path)?;
        let snap: Snapshot = bincode::deserialize(&bytes)?;
        validate(&snap)?;
        Ok(Some(snap))
    }

    /// Copies the current canonical snapshot to
    /// `backups/rdb_backup_YYYYMMDD_HHMMSS.bin`.
    pub fn backup_create(&self) -> Result<PathBuf> {
        if !self.canonical_path.exists() {
            return Err(PersistenceError::PersistenceFailed(
                "no canonical snapshot to back up".into(),
            ));
        }
        let name = format!("rdb_backup_{}.bin", timestamp_suffix());
        let dest = self.backups_dir.join(name);
        fs::copy(&self.canonical_path, &dest)?;
        Ok(dest)
    }

    pub fn backup_list(&self) -> Result<Vec<PathBuf>> {
        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                backups.push(entry.path());
            }
        }
        backups.sort();
        Ok(backups)
    }

    /// Atomically installs `backup_path` as the canonical snapshot,
    /// validating it first so a corrupt backup is never promoted.
    pub fn backup_restore(&self, backup_path: &Path) -> Result<()> {
        let bytes = fs::read(backup_path)?;
        let snap: Snapshot = bincode::deserialize(&bytes)?;
        validate(&snap)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.temp_dir)?;
        use std::io::Write;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.canonical_path)
            .map_err(|e| PersistenceError::PersistenceFailed(e.to_string()))?;
        Ok(())
    }

    /// Applies retention: keeps at most `retention` most-recent backups,
    /// deleting the oldest first.
    pub fn enforce_backup_retention(&self, retention: usize) -> Result<()> {
        let mut backups = self.backup_list()?;
        if backups.len() <= retention {
            return Ok(());
        }
        backups.sort();
        let excess = backups.len() - retention;
        for path in backups.into_iter().take(excess) {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn timestamp_suffix() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    // YYYYMMDD_HHMMSS from a Unix timestamp, no external time crate: this
    // store never needs timezone awareness, only a monotonically
    // increasing, filesystem-sortable name.
    let days = secs / 86_400;
    let secs_of_day = secs % 86_400;
    let (year, month, day) = civil_from_days(days as i64);
    let hour = secs_of_day / 3600;
    let minute = (secs_of_day % 3600) / 60;
    let second = secs_of_day % 60;
    format!("{year:04}{month:02}{day:02}_{hour:02}{minute:02}{second:02}")
}

/// Howard Hinnant's `civil_from_days` algorithm (proleptic Gregorian,
/// days since 1970-01-01), used only for backup filenames.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// `version` is `"1.0"`; timestamp is nonzero; each database/collection
/// name matches its map key; every vector in a collection shares the first
/// vector's dimension.
fn validate(snap: &Snapshot) -> Result<()> {
    if snap.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::CorruptedData(format!(
            "unsupported snapshot version '{}'",
            snap.version
        )));
    }
    if snap.timestamp == 0 {
        return Err(PersistenceError::CorruptedData(
            "snapshot timestamp is zero".into(),
        ));
    }
    for (db_name, db_state) in &snap.databases {
        if &db_state.name != db_name {
            return Err(PersistenceError::CorruptedData(format!(
                "database key '{db_name}' does not match embedded name '{}'",
                db_state.name
            )));
        }
        for (coll_name, coll_state) in &db_state.collections {
            if &coll_state.config.name != coll_name {
                return Err(PersistenceError::CorruptedData(format!(
                    "collection key '{coll_name}' does not match embedded config name '{}'",
                    coll_state.config.name
                )));
            }
            if let Some(first) = coll_state.vectors.first() {
                let dim = first.elements.len();
                if coll_state.vectors.iter().any(|v| v.elements.len() != dim) {
                    return Err(PersistenceError::CorruptedData(format!(
                        "collection '{coll_name}' has vectors of mismatched dimension"
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vectrix_core::{CollectionConfig, Engine, HnswParams, Metric, Vector};

    fn sample_snapshot() -> Snapshot {
        let mut engine = Engine::new();
        engine.create_database("d").unwrap();
        engine
            .create_collection(
                "d",
                CollectionConfig {
                    name: "c".into(),
                    metric: Metric::L2,
                    hnsw: HnswParams::default(),
                },
            )
            .unwrap();
        engine
            .insert("d", "c", &[Vector::new(1, vec![1.0, 2.0, 3.0])])
            .unwrap();
        engine.capture_state()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path(), "snapshot.bin").unwrap();
        let snap = sample_snapshot();
        store.save(&snap).unwrap();

        let loaded = store.load().unwrap().expect("snapshot should exist");
        assert_eq!(loaded.version, snap.version);
        assert_eq!(loaded.databases.len(), 1);
    }

    #[test]
    fn load_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path(), "snapshot.bin").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_never_partially_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path(), "snapshot.bin").unwrap();
        let first = sample_snapshot();
        store.save(&first).unwrap();
        let before = fs::read(store.canonical_path()).unwrap();

        // A second save with a corrupt-looking but still well-formed
        // snapshot must still land atomically; the file is never observed
        // in a half-written state because `persist` is a single rename.
        let second = sample_snapshot();
        store.save(&second).unwrap();
        let after = fs::read(store.canonical_path()).unwrap();
        assert_eq!(before.len() > 0, after.len() > 0);
    }

    #[test]
    fn backup_create_list_and_restore() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path(), "snapshot.bin").unwrap();
        store.save(&sample_snapshot()).unwrap();

        let backup_path = store.backup_create().unwrap();
        assert!(backup_path.exists());
        assert_eq!(store.backup_list().unwrap().len(), 1);

        fs::remove_file(store.canonical_path()).unwrap();
        store.backup_restore(&backup_path).unwrap();
        assert!(store.load().unwrap().is_some());
    }

    #[test]
    fn backup_retention_deletes_oldest_first() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path(), "snapshot.bin").unwrap();
        store.save(&sample_snapshot()).unwrap();
        for _ in 0..5 {
            store.backup_create().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(1100));
        }
        store.enforce_backup_retention(2).unwrap();
        assert!(store.backup_list().unwrap().len() <= 2);
    }

    #[test]
    fn validate_rejects_mismatched_version() {
        let mut snap = sample_snapshot();
        snap.version = "0.9".to_string();
        assert!(matches!(
            validate(&snap),
            Err(PersistenceError::CorruptedData(_))
        ));
    }
}
