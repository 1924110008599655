//! Per-key storage unit.
//!
//! A [`StorageUnit`] is the lock + artifact pair backing one key. Shared
//! access goes through [`ReadAccess`], exclusive access through
//! [`WriteAccess`]; both carry the lock guard, so the lock is released on
//! every exit path (including unwinding) when the access value is dropped.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::key::{artifact_name, temp_name, validate_key};
use crate::lock::{ReadHold, UnitLock, WriteHold};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The persistence and locking unit for one key.
///
/// # Example
///
/// ```rust
/// use keystash_storage::{InMemoryBackend, StorageResult, StorageUnit};
/// use std::io::Write;
/// use std::sync::Arc;
///
/// let unit = StorageUnit::new("counter", "json", Arc::new(InMemoryBackend::new()), None)?;
/// assert!(!unit.exists()?);
///
/// let result: StorageResult<()> = unit.with_write_lock(|access| {
///     access.create_if_absent()?;
///     access.atomic_replace(|sink: &mut dyn Write| -> StorageResult<()> {
///         Ok(sink.write_all(b"1")?)
///     })
/// });
/// result?;
/// assert!(unit.exists()?);
/// # Ok::<(), keystash_storage::StorageError>(())
/// ```
#[derive(Debug)]
pub struct StorageUnit {
    key: String,
    artifact: String,
    temp: String,
    backend: Arc<dyn StorageBackend>,
    lock: UnitLock,
}

impl StorageUnit {
    /// Creates a unit for `key`, stored as `<key>.<extension>`.
    ///
    /// Nothing is created on the backend until the first write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the key cannot name an artifact.
    pub fn new(
        key: impl Into<String>,
        extension: &str,
        backend: Arc<dyn StorageBackend>,
        lock_timeout: Option<Duration>,
    ) -> StorageResult<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self {
            artifact: artifact_name(&key, extension),
            temp: temp_name(&key, extension),
            key,
            backend,
            lock: UnitLock::new(lock_timeout),
        })
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the artifact name.
    #[must_use]
    pub fn artifact_name(&self) -> &str {
        &self.artifact
    }

    /// Returns the temporary artifact name used during replacement.
    #[must_use]
    pub fn temp_name(&self) -> &str {
        &self.temp
    }

    /// Returns the unit's lock.
    #[must_use]
    pub fn lock(&self) -> &UnitLock {
        &self.lock
    }

    /// Returns whether the artifact is present.
    ///
    /// This is advisory: it takes no lock. Every mutation path re-checks
    /// existence under the exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot determine presence.
    pub fn exists(&self) -> StorageResult<bool> {
        self.backend.exists(&self.artifact)
    }

    /// Acquires the shared lock.
    ///
    /// Called on the thread that holds the exclusive lock, this reads
    /// under that hold.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockTimeout`] if a timeout is configured and elapses.
    pub fn read(&self) -> StorageResult<ReadAccess<'_>> {
        let hold = self.lock.read(&self.key)?;
        Ok(ReadAccess {
            unit: self,
            _hold: hold,
        })
    }

    /// Acquires the exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReentrantWrite`] if this thread already holds
    /// it, or [`StorageError::LockTimeout`] if a timeout is configured and
    /// elapses.
    pub fn write(&self) -> StorageResult<WriteAccess<'_>> {
        let hold = self.lock.write(&self.key)?;
        Ok(WriteAccess {
            unit: self,
            _hold: hold,
        })
    }

    /// Runs `body` while holding the shared lock.
    ///
    /// # Errors
    ///
    /// Returns the lock error, or whatever `body` returns.
    pub fn with_read_lock<R, E, F>(&self, body: F) -> Result<R, E>
    where
        F: FnOnce(&ReadAccess<'_>) -> Result<R, E>,
        E: From<StorageError>,
    {
        let access = self.read()?;
        body(&access)
    }

    /// Runs `body` while holding the exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns the lock error, or whatever `body` returns.
    pub fn with_write_lock<R, E, F>(&self, body: F) -> Result<R, E>
    where
        F: FnOnce(&WriteAccess<'_>) -> Result<R, E>,
        E: From<StorageError>,
    {
        let access = self.write()?;
        body(&access)
    }
}

/// Read operations available under either lock mode.
pub trait ArtifactRead {
    /// Returns the unit this access was taken on.
    fn unit(&self) -> &StorageUnit;

    /// Returns the unit's key.
    fn key(&self) -> &str {
        &self.unit().key
    }

    /// Returns whether the artifact is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot determine presence.
    fn exists(&self) -> StorageResult<bool> {
        self.unit().exists()
    }

    /// Opens the current artifact for reading.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the artifact is missing.
    fn open_reader(&self) -> StorageResult<Box<dyn Read + Send>> {
        let unit = self.unit();
        unit.backend.open_reader(&unit.artifact)
    }
}

/// Shared access to a unit's artifact.
#[derive(Debug)]
pub struct ReadAccess<'a> {
    unit: &'a StorageUnit,
    _hold: ReadHold<'a>,
}

impl ArtifactRead for ReadAccess<'_> {
    fn unit(&self) -> &StorageUnit {
        self.unit
    }
}

/// Exclusive access to a unit's artifact.
#[derive(Debug)]
pub struct WriteAccess<'a> {
    unit: &'a StorageUnit,
    _hold: WriteHold<'a>,
}

impl ArtifactRead for WriteAccess<'_> {
    fn unit(&self) -> &StorageUnit {
        self.unit
    }
}

impl WriteAccess<'_> {
    /// Opens the current artifact for writing in place, truncating it.
    ///
    /// This bypasses the temporary artifact; prefer [`Self::atomic_replace`].
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be opened.
    pub fn open_writer(&self) -> StorageResult<Box<dyn Write + Send>> {
        self.unit.backend.open_writer(&self.unit.artifact)
    }

    /// Creates an empty artifact unless one is already present.
    ///
    /// Returns `false` if the artifact is absent and could not be created.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    pub fn create_if_absent(&self) -> StorageResult<bool> {
        if self.exists()? {
            return Ok(true);
        }
        let created = self.unit.backend.create_new(&self.unit.artifact)?;
        if created {
            debug!(key = %self.unit.key, "created artifact");
        }
        Ok(created)
    }

    /// Removes the artifact.
    ///
    /// Returns `true` if the artifact no longer exists, including the case
    /// where it never existed.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    pub fn delete(&self) -> StorageResult<bool> {
        let removed = self.unit.backend.remove(&self.unit.artifact)?;
        if removed {
            debug!(key = %self.unit.key, "deleted artifact");
        }
        Ok(removed)
    }

    /// Replaces the artifact's contents with whatever `encode` writes.
    ///
    /// The bytes go to the temporary artifact first. Only if encoding and
    /// flushing succeed is the temporary renamed over the current artifact,
    /// which replaces it in one step. On any failure the temporary artifact is
    /// discarded and the previous contents stay visible.
    ///
    /// # Errors
    ///
    /// Returns the encoder's error, an I/O error from writing or flushing,
    /// or [`StorageError::ReplaceFailed`] if the rename fails. A rename that
    /// reports an error after the temporary has already moved into place is
    /// logged and treated as committed, since the new contents are visible.
    pub fn atomic_replace<E, F>(&self, encode: F) -> Result<(), E>
    where
        F: FnOnce(&mut dyn Write) -> Result<(), E>,
        E: From<StorageError>,
    {
        let unit = self.unit;
        let mut sink = unit.backend.open_writer(&unit.temp)?;

        let written = encode(&mut *sink)
            .and_then(|()| sink.flush().map_err(|err| StorageError::from(err).into()));
        drop(sink);

        if let Err(err) = written {
            self.discard_temp();
            return Err(err);
        }

        if let Err(err) = unit.backend.rename(&unit.temp, &unit.artifact) {
            // A vanished temporary means the move happened before the error
            if !matches!(unit.backend.exists(&unit.temp), Ok(false)) {
                self.discard_temp();
                return Err(StorageError::replace_failed(&unit.key, err).into());
            }
            warn!(
                key = %unit.key,
                error = %err,
                "rename reported an error after moving the artifact"
            );
        }

        debug!(key = %unit.key, "replaced artifact");
        Ok(())
    }

    fn discard_temp(&self) {
        if let Err(err) = self.unit.backend.remove(&self.unit.temp) {
            warn!(key = %self.unit.key, error = %err, "failed to discard temporary artifact");
        }
    }
}
