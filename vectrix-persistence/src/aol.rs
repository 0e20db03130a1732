//! Append-only log: a sequence of length-prefixed binary records, the
//! durability primitive every mutating engine operation is appended to
//! after it succeeds in memory.
//!
//! Framing: `⟨len: u32 LE⟩⟨payload: len bytes⟩`. `len == 0` or
//! `len > MAX_RECORD_BYTES` is treated as corruption rather than a valid
//! (if unusual) record, since no command this crate ever encodes is empty
//! or anywhere near the 100 MiB ceiling.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use vectrix_core::AOLRecord;

use crate::error::{PersistenceError, Result};

const LENGTH_PREFIX_BYTES: usize = 4;
const MAX_RECORD_BYTES: u32 = 100 * 1024 * 1024;

/// Per-record durability mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPolicy {
    /// Flush and fsync after every append.
    Always,
    /// A background task fsyncs on a bounded schedule; see
    /// `AppendOnlyLog::should_background_sync`.
    EverySec,
    /// Rely entirely on the OS page cache.
    Never,
}

/// Buffered-write threshold and minimum/maximum sync intervals for
/// `SyncPolicy::EverySec`, per spec: flush when there is buffered data AND
/// at least one second has passed since the last sync AND either at least
/// 4 KiB is buffered or at least 5 seconds have passed.
const EVERY_SEC_MIN_INTERVAL: Duration = Duration::from_secs(1);
const EVERY_SEC_MAX_INTERVAL: Duration = Duration::from_secs(5);
const EVERY_SEC_BUFFER_THRESHOLD: u64 = 4 * 1024;

pub struct AppendOnlyLog {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_policy: SyncPolicy,
    record_count: u64,
    bytes_since_sync: u64,
    last_sync: Instant,
}

impl AppendOnlyLog {
    pub fn open<P: AsRef<Path>>(path: P, sync_policy: SyncPolicy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let record_count = count_records(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            sync_policy,
            record_count,
            bytes_since_sync: 0,
            last_sync: Instant::now(),
        })
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        self.sync_policy
    }

    /// Serializes and appends `record`, then applies the sync policy.
    pub fn append(&mut self, record: &AOLRecord) -> Result<()> {
        let payload = bincode::serialize(record)?;
        if payload.len() > MAX_RECORD_BYTES as usize {
            return Err(PersistenceError::PersistenceFailed(format!(
                "record of {} bytes exceeds max frame size",
                payload.len()
            )));
        }

        let len = payload.len() as u32;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&payload)?;
        self.record_count += 1;
        self.bytes_since_sync += (LENGTH_PREFIX_BYTES + payload.len()) as u64;

        match self.sync_policy {
            SyncPolicy::Always => {
                self.writer.flush()?;
                self.writer.get_ref().sync_all()?;
                self.bytes_since_sync = 0;
                self.last_sync = Instant::now();
            }
            SyncPolicy::EverySec => {
                if self.should_background_sync() {
                    self.flush_and_sync()?;
                }
            }
            SyncPolicy::Never => {}
        }
        Ok(())
    }

    /// Whether a background tick should flush+fsync now, per the
    /// buffered-bytes/elapsed-time policy above.
    pub fn should_background_sync(&self) -> bool {
        if self.bytes_since_sync == 0 {
            return false;
        }
        let elapsed = self.last_sync.elapsed();
        elapsed >= EVERY_SEC_MIN_INTERVAL
            && (self.bytes_since_sync >= EVERY_SEC_BUFFER_THRESHOLD
                || elapsed >= EVERY_SEC_MAX_INTERVAL)
    }

    pub fn flush_and_sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.bytes_since_sync = 0;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Reads every record sequentially, decoding and invoking `cb` for each.
    /// A framing error reports the byte offset and record index of the bad
    /// frame; a `cb` error is wrapped with the same context and the
    /// remainder of the log is not read.
    pub fn replay<F>(
        &self,
        cancellation: Option<&tokio_util::sync::CancellationToken>,
        mut cb: F,
    ) -> Result<u64>
    where
        F: FnMut(AOLRecord) -> Result<()>,
    {
        self.writer.get_ref().sync_all().ok();
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut offset: u64 = 0;
        let mut index: u64 = 0;

        loop {
            if cancellation.is_some_and(|t| t.is_cancelled()) {
                return Err(PersistenceError::Cancelled);
            }
            let mut len_bytes = [0u8; LENGTH_PREFIX_BYTES];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_bytes);
            if len == 0 || len > MAX_RECORD_BYTES {
                return Err(PersistenceError::CorruptedData(format!(
                    "invalid frame length {len} at byte offset {offset}, record index {index}"
                )));
            }

            let mut payload = vec![0u8; len as usize];
            if reader.read_exact(&mut payload).is_err() {
                return Err(PersistenceError::CorruptedData(format!(
                    "truncated record at byte offset {offset}, record index {index}"
                )));
            }

            let record: AOLRecord = bincode::deserialize(&payload).map_err(|e| {
                PersistenceError::CorruptedData(format!(
                    "decode failure at byte offset {offset}, record index {index}: {e}"
                ))
            })?;

            cb(record).map_err(|e| {
                PersistenceError::RecoveryFailed(format!(
                    "handler failed on record index {index} (byte offset {offset}): {e}"
                ))
            })?;

            offset += (LENGTH_PREFIX_BYTES + len as usize) as u64;
            index += 1;
        }
        Ok(index)
    }

    /// Writes `records` to a sibling temp file with identical framing,
    /// flushes+fsyncs it, then atomically renames it over the active file
    /// and reopens the writer. On any failure the temp file is removed and
    /// the original file is left untouched.
    pub fn rewrite(&mut self, records: &[AOLRecord]) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            for record in records {
                let payload = bincode::serialize(record)?;
                let len = payload.len() as u32;
                writer.write_all(&len.to_le_bytes())?;
                writer.write_all(&payload)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| PersistenceError::PersistenceFailed(e.to_string()))?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.record_count = records.len() as u64;
        self.bytes_since_sync = 0;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Closes the current file, recreates it empty, and resets counters.
    pub fn truncate(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.sync_all()?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.record_count = 0;
        self.bytes_since_sync = 0;
        self.last_sync = Instant::now();
        Ok(())
    }

    pub fn file_size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}

/// Best-effort count of complete, well-framed records in `path`. Unlike
/// `replay`, this never errors on a malformed or truncated trailing frame —
/// it simply stops counting there. `replay` is the strict validator that
/// recovery actually relies on; this only seeds `record_count` for metrics
/// at open time.
fn count_records(path: &Path) -> Result<u64> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut count = 0u64;
    loop {
        let mut len_bytes = [0u8; LENGTH_PREFIX_BYTES];
        match reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(_) => break,
        }
        let len = u32::from_le_bytes(len_bytes);
        if len == 0 || len > MAX_RECORD_BYTES {
            break;
        }
        let mut payload = vec![0u8; len as usize];
        if reader.read_exact(&mut payload).is_err() {
            break;
        }
        count += 1;
    }
    Ok(count)
}
