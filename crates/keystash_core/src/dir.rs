//! Store directory management.
//!
//! A file-backed store lives in one directory:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock held by the owning process
//! ├─ <key>.<ext>       # One artifact per key
//! └─ <key>.<ext>.tmp   # Transient, only while a replacement is in flight
//! ```
//!
//! The LOCK file keeps two processes from operating on the same store,
//! since per-key locks only coordinate threads within one process.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the advisory lock file.
pub const LOCK_FILE: &str = "LOCK";

/// Holds the store directory, optionally with an exclusive lock on it.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    lock_file: Option<File>,
}

impl StoreDir {
    /// Opens (or creates) a store directory.
    ///
    /// With `lock` set, the LOCK file is created and locked exclusively
    /// without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path exists but is not a directory
    /// - Another process holds the lock (returns `DirectoryLocked`)
    pub fn open(path: &Path, create_if_missing: bool, lock: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("store directory does not exist: {}", path.display()),
                )
                .into());
            }
        }

        if !path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )
            .into());
        }

        let lock_file = if lock {
            let lock_file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path.join(LOCK_FILE))?;

            if lock_file.try_lock_exclusive().is_err() {
                return Err(StoreError::DirectoryLocked {
                    path: path.to_path_buf(),
                });
            }
            debug!(path = %path.display(), "locked store directory");
            Some(lock_file)
        } else {
            None
        };

        Ok(Self {
            path: path.to_path_buf(),
            lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether this instance holds the directory lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock_file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("new_store");

        let dir = StoreDir::open(&store_path, true, true).unwrap();
        assert!(store_path.is_dir());
        assert!(store_path.join(LOCK_FILE).exists());
        assert_eq!(dir.path(), store_path);
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let result = StoreDir::open(&temp.path().join("missing"), false, true);
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn open_fails_on_plain_file() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("file");
        fs::write(&file_path, b"x").unwrap();

        assert!(StoreDir::open(&file_path, true, false).is_err());
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("locked");

        let _first = StoreDir::open(&store_path, true, true).unwrap();
        let result = StoreDir::open(&store_path, true, true);
        assert!(matches!(result, Err(StoreError::DirectoryLocked { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("reopen");

        {
            let _dir = StoreDir::open(&store_path, true, true).unwrap();
        }

        let dir = StoreDir::open(&store_path, true, true).unwrap();
        assert!(dir.is_locked());
    }

    #[test]
    fn unlocked_opens_coexist() {
        let temp = tempdir().unwrap();
        let first = StoreDir::open(temp.path(), true, false).unwrap();
        let second = StoreDir::open(temp.path(), true, false).unwrap();
        assert!(!first.is_locked());
        assert!(!second.is_locked());
    }
}
