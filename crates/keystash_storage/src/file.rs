//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::key::TEMP_SUFFIX;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file-based storage backend.
///
/// Every artifact is a file directly under the base directory. Data
/// survives process restarts.
///
/// # Durability
///
/// With `sync_writes` enabled (the default):
/// - flushing a writer calls `File::sync_all()` so the bytes are on disk
/// - `rename` fsyncs the base directory so the new directory entry is on disk
///
/// # Thread Safety
///
/// The backend itself holds no mutable state and can be shared across
/// threads. Concurrent access to one artifact must be serialized by the
/// caller (see [`crate::StorageUnit`]).
///
/// # Example
///
/// ```no_run
/// use keystash_storage::{FileBackend, StorageBackend};
/// use std::io::Write;
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("data"), true).unwrap();
/// let mut writer = backend.open_writer("notes.json").unwrap();
/// writer.write_all(b"[]").unwrap();
/// writer.flush().unwrap(); // Ensure data is durable
/// ```
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    sync_writes: bool,
}

impl FileBackend {
    /// Opens a file backend rooted at `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory holding the artifacts
    /// * `create_if_missing` - If true, creates the directory (and parents)
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing and may not be created,
    /// if the path is not a directory, or if creation fails.
    pub fn open(root: &Path, create_if_missing: bool) -> StorageResult<Self> {
        if !root.exists() {
            if create_if_missing {
                fs::create_dir_all(root)?;
            } else {
                return Err(StorageError::not_found(root.display().to_string()));
            }
        }

        if !root.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", root.display()),
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
            sync_writes: true,
        })
    }

    /// Sets whether writers and renames are fsynced.
    #[must_use]
    pub fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Returns the base directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of a named artifact.
    #[must_use]
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Deletes temporary artifacts left behind by an interrupted replace.
    ///
    /// A temporary artifact is never the committed state of a key, so it is
    /// always safe to discard at open time.
    ///
    /// # Returns
    ///
    /// The number of files removed.
    pub fn remove_stale_temporaries(&self) -> StorageResult<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let is_temp = name.to_str().is_some_and(|n| n.ends_with(TEMP_SUFFIX));
            if is_temp && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                debug!(file = ?entry.path(), "removed stale temporary artifact");
                removed += 1;
            }
        }

        if removed > 0 && self.sync_writes {
            self.sync_directory()?;
        }

        Ok(removed)
    }

    /// Syncs the base directory so that creates, renames and deletes are durable.
    ///
    /// On Windows, directory fsync is not supported in the same way as Unix.
    /// NTFS journaling covers metadata durability, so this is a no-op there.
    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        File::open(&self.root)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.path_of(name).is_file())
    }

    fn create_new(&self, name: &str) -> StorageResult<bool> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_of(name))
        {
            Ok(_) => {
                if self.sync_writes {
                    self.sync_directory()?;
                }
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(true),
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, name: &str) -> StorageResult<bool> {
        let path = self.path_of(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                if self.sync_writes {
                    self.sync_directory()?;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(!path.exists())
    }

    fn open_reader(&self, name: &str) -> StorageResult<Box<dyn Read + Send>> {
        match File::open(self.path_of(name)) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::not_found(name))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn open_writer(&self, name: &str) -> StorageResult<Box<dyn Write + Send>> {
        let file = File::create(self.path_of(name))?;
        Ok(Box::new(FileSink {
            writer: BufWriter::new(file),
            sync: self.sync_writes,
        }))
    }

    fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        match fs::rename(self.path_of(from), self.path_of(to)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(from));
            }
            Err(err) => return Err(err.into()),
        }

        if self.sync_writes {
            if let Err(err) = self.sync_directory() {
                // The new artifact is already visible; reporting failure would lie
                warn!(error = %err, to, "directory sync after rename failed");
            }
        }
        Ok(())
    }

    fn size(&self, name: &str) -> StorageResult<u64> {
        match fs::metadata(self.path_of(name)) {
            Ok(meta) => Ok(meta.len()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::not_found(name))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Buffered file writer that optionally fsyncs on flush.
struct FileSink {
    writer: BufWriter<File>,
    sync: bool,
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        if self.sync {
            self.writer.get_ref().sync_all()?;
        }
        Ok(())
    }
}
