//! Storage Module.
//!
//! Handles persistent state of a vault:
//! - Raw file operations (atomic writes, appends).
//! - Scan state: checkpoint, sealed record cache, transaction log and the
//!   single-writer lock.

pub mod raw_files;
pub mod state;

pub use state::{StateLock, StateSink, StateStore, TxLogEntry};

use std::path::PathBuf;

use crate::crypto::CryptoError;

/// Errors related to storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Data corruption or integrity check failed.
    #[error("corrupt state file {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("file {} is too large ({len} bytes)", .path.display())]
    TooLarge { path: PathBuf, len: u64 },
    /// Another process holds the state directory.
    #[error("state directory {} is locked", .0.display())]
    Locked(PathBuf),
    /// Invalid path or filename.
    #[error("invalid path {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("sealing state failed: {0}")]
    Crypto(#[from] CryptoError),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io { path: path.into(), source }
    }
}
