//! Persisted scan state.
//!
//! Layout of a state directory:
//! - `checkpoint.json`: checkpoint height and the cursor of an unfinished pass.
//! - `secrets.sealed`: the record cache, encrypted under the operational key.
//! - `transactions.log`: append-only `tx_hash,amount_code` lines of every
//!   secret this vault published.
//! - `vault.lock`: carries the OS advisory lock of the current writer. The
//!   lock dies with its process; the file itself may outlive it.
//!
//! The sealed cache is written before the checkpoint, so a checkpoint on disk
//! never covers records that are not.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::raw_files;
use super::StorageError;
use crate::crypto::{self, CryptoError, Key};
use crate::ledger::{CommitSink, ScanCheckpoint, ScanCursor, ScanState, SecretCache};

pub const CHECKPOINT_FILE: &str = "checkpoint.json";
pub const SEALED_CACHE_FILE: &str = "secrets.sealed";
pub const TX_LOG_FILE: &str = "transactions.log";
pub const LOCK_FILE: &str = "vault.lock";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    last_scanned_height: u64,
    #[serde(default)]
    cursor: Option<ScanCursor>,
    /// Leading transaction log entries a completed pass from height zero has
    /// already accounted for, found or not.
    #[serde(default)]
    log_verified: usize,
}

/// One line of the transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxLogEntry {
    pub tx_hash: String,
    pub amount_code: u64,
}

impl TxLogEntry {
    fn parse(line: &str) -> Option<Self> {
        let (hash, amount) = line.trim().split_once(',')?;
        let hash = hash.trim();
        if hash.is_empty() {
            return None;
        }
        Some(Self { tx_hash: hash.to_string(), amount_code: amount.trim().parse().ok()? })
    }
}

/// Files of one vault.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Opens (and creates if needed) a state directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Takes the single-writer lock.
    pub fn lock(&self) -> Result<StateLock, StorageError> {
        StateLock::acquire(self.dir.join(LOCK_FILE))
    }

    /// Loads the scan state, unsealing the cache with `key`.
    ///
    /// The checkpoint is never moved back. When the cache is lost (sealed
    /// under another key, or gone while progress exists) or misses an entry
    /// of `log` not yet verified, the state carries a cursor for a pass from
    /// height zero; a scan resumes that pass across runs until it completes.
    pub fn load(&self, key: &Key, log: &[TxLogEntry]) -> Result<ScanState, StorageError> {
        let progress = self.read_progress()?;

        let sealed_path = self.dir.join(SEALED_CACHE_FILE);
        let cache = match raw_files::read_optional(&sealed_path)? {
            Some(token) => match crypto::decrypt(&token, key) {
                Ok(json) => {
                    let json = Zeroizing::new(json);
                    Some(serde_json::from_slice::<SecretCache>(&json).map_err(|e| StorageError::Corrupt {
                        path: sealed_path.clone(),
                        reason: e.to_string(),
                    })?)
                }
                Err(CryptoError::Authentication) => {
                    log::warn!("Sealed cache does not open with this key; discarding it");
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let had_progress = progress.last_scanned_height > 0 || progress.cursor.is_some();
        let cache_lost = cache.is_none() && had_progress;
        let mut state = ScanState {
            checkpoint: ScanCheckpoint { last_scanned_height: progress.last_scanned_height },
            cache: cache.unwrap_or_default(),
            cursor: progress.cursor,
        };

        let missing = log
            .iter()
            .skip(progress.log_verified)
            .filter(|e| !state.cache.contains(&e.tx_hash))
            .count();
        if (cache_lost || missing > 0) && state.cursor.map_or(true, |c| c.from_height != 0) {
            if cache_lost {
                log::warn!("No usable record cache; rescanning from height 0");
            } else if had_progress {
                log::warn!("{} logged transaction(s) missing from cache; rescanning from height 0", missing);
            }
            state.cursor = Some(ScanCursor::new(0));
        }

        log::debug!(
            "Loaded state: checkpoint {}, {} cached record(s)",
            state.checkpoint.last_scanned_height,
            state.cache.len()
        );
        Ok(state)
    }

    /// Persists `state`: sealed cache first, then the checkpoint.
    pub fn save(&self, state: &ScanState, key: &Key) -> Result<(), StorageError> {
        let sealed_path = self.dir.join(SEALED_CACHE_FILE);
        let json = Zeroizing::new(serde_json::to_vec(&state.cache).map_err(|e| StorageError::Corrupt {
            path: sealed_path.clone(),
            reason: e.to_string(),
        })?);
        let token = crypto::encrypt(&json, key)?;
        raw_files::write_atomic(&sealed_path, &token)?;

        let mut progress = self.read_progress()?;
        progress.last_scanned_height = state.checkpoint.last_scanned_height;
        progress.cursor = state.cursor;
        self.write_progress(&progress)
    }

    /// Marks the first `count` transaction log entries as settled: a full
    /// pass from height zero has seen every one of them that reached the
    /// ledger, so the rest no longer force a rescan.
    pub fn mark_log_verified(&self, count: usize) -> Result<(), StorageError> {
        let mut progress = self.read_progress()?;
        if progress.log_verified >= count {
            return Ok(());
        }
        progress.log_verified = count;
        self.write_progress(&progress)
    }

    fn read_progress(&self) -> Result<CheckpointFile, StorageError> {
        let path = self.dir.join(CHECKPOINT_FILE);
        match raw_files::read_optional(&path)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::Corrupt { path: path.clone(), reason: e.to_string() }),
            None => Ok(CheckpointFile::default()),
        }
    }

    fn write_progress(&self, progress: &CheckpointFile) -> Result<(), StorageError> {
        let path = self.dir.join(CHECKPOINT_FILE);
        let json = serde_json::to_vec_pretty(progress)
            .map_err(|e| StorageError::Corrupt { path: path.clone(), reason: e.to_string() })?;
        raw_files::write_atomic(&path, &json)
    }

    /// Records a published secret.
    pub fn append_tx(&self, tx_hash: &str, amount_code: u64) -> Result<(), StorageError> {
        if tx_hash.is_empty() || tx_hash.contains(['\n', ',']) {
            return Err(StorageError::Corrupt {
                path: self.dir.join(TX_LOG_FILE),
                reason: format!("unloggable transaction hash {:?}", tx_hash),
            });
        }
        raw_files::append_line(self.dir.join(TX_LOG_FILE), &format!("{},{}", tx_hash, amount_code))
    }

    /// Reads the transaction log. Unparseable lines are skipped.
    pub fn read_tx_log(&self) -> Result<Vec<TxLogEntry>, StorageError> {
        let Some(bytes) = raw_files::read_optional(self.dir.join(TX_LOG_FILE))? else {
            return Ok(Vec::new());
        };
        let text = String::from_utf8_lossy(&bytes);
        let mut entries = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match TxLogEntry::parse(line) {
                Some(entry) => entries.push(entry),
                None => log::warn!("Skipping malformed transaction log line"),
            }
        }
        Ok(entries)
    }

    /// A commit sink that saves every committed page under `key`.
    pub fn sink<'a>(&'a self, key: &'a Key) -> StateSink<'a> {
        StateSink { store: self, key }
    }
}

/// Persists scan progress into a [`StateStore`].
pub struct StateSink<'a> {
    store: &'a StateStore,
    key: &'a Key,
}

impl CommitSink for StateSink<'_> {
    type Error = StorageError;

    fn commit(&mut self, state: &ScanState) -> Result<(), StorageError> {
        self.store.save(state, self.key)
    }
}

/// Exclusive claim on a state directory.
///
/// Held as an advisory lock on an open file. Dropping the guard, or the
/// death of the holding process, releases it.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    fn acquire(path: PathBuf) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                log::debug!("Locked {}", path.display());
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock
                || e.raw_os_error() == fs4::lock_contended_error().raw_os_error() =>
            {
                Err(StorageError::Locked(path.parent().map(Path::to_path_buf).unwrap_or_default()))
            }
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("Could not release lock on {}: {}", self.path.display(), e);
        }
    }
}
