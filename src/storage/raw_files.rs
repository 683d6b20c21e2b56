//! Raw File Storage.
//!
//! Provides basic file system operations with security checks.
//!
//! # Security
//! - Ensures files are written atomically (write-sync-rename).
//! - Sets restrictive permissions (where supported).

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use super::StorageError;

/// State files are small; anything bigger is not ours.
const MAX_FILE_LEN: u64 = 64 * 1024 * 1024;

fn owner_only(options: &mut OpenOptions) -> &mut OpenOptions {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

/// Writes data to a file atomically.
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), StorageError> {
    let path = path.as_ref();
    let filename = path.file_name().ok_or_else(|| StorageError::InvalidPath(path.to_path_buf()))?;
    let temp_path = path.with_file_name(format!("{}.tmp", filename.to_string_lossy()));

    let mut file = owner_only(OpenOptions::new().write(true).create(true).truncate(true))
        .open(&temp_path)
        .map_err(|e| StorageError::io(&temp_path, e))?;
    file.write_all(data).map_err(|e| StorageError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| StorageError::io(&temp_path, e))?;

    // Rename to final path (atomic on POSIX)
    fs::rename(&temp_path, path).map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Reads a whole file.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, StorageError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let len = file.metadata().map_err(|e| StorageError::io(path, e))?.len();
    if len > MAX_FILE_LEN {
        return Err(StorageError::TooLarge { path: path.to_path_buf(), len });
    }

    let mut buffer = Vec::with_capacity(len as usize);
    file.read_to_end(&mut buffer).map_err(|e| StorageError::io(path, e))?;
    Ok(buffer)
}

/// Like [`read_file`], but a missing file is `None`.
pub fn read_optional<P: AsRef<Path>>(path: P) -> Result<Option<Vec<u8>>, StorageError> {
    match read_file(path) {
        Ok(data) => Ok(Some(data)),
        Err(StorageError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Appends one line and syncs it to disk.
pub fn append_line<P: AsRef<Path>>(path: P, line: &str) -> Result<(), StorageError> {
    let path = path.as_ref();
    let mut file = owner_only(OpenOptions::new().append(true).create(true))
        .open(path)
        .map_err(|e| StorageError::io(path, e))?;
    writeln!(file, "{}", line).map_err(|e| StorageError::io(path, e))?;
    file.sync_all().map_err(|e| StorageError::io(path, e))
}
