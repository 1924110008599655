//! Storage backend trait definition.

use crate::error::StorageResult;
use std::fmt;
use std::io::{Read, Write};

/// A named-blob storage backend for KeyStash.
///
/// Backends are **opaque artifact stores**. Each artifact is addressed by a
/// name (for example `settings.json` or `settings.json.tmp`) and holds an
/// arbitrary byte string. Backends never interpret the bytes.
///
/// Backends do no locking of their own beyond what is needed for memory
/// safety; serialization of readers and writers for one key is the job of
/// [`crate::StorageUnit`].
///
/// # Invariants
///
/// - `create_new` leaves an (empty) artifact behind when it returns `Ok(true)`
/// - `open_writer` truncates; the written bytes are complete once `flush`
///   returns successfully
/// - `rename` replaces the destination in a single step, so a reader sees
///   either the old or the new artifact, never a mix or a gap
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Returns whether the named artifact is present.
    ///
    /// # Errors
    ///
    /// Returns an error if presence cannot be determined.
    fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Creates an empty artifact if none exists.
    ///
    /// Returns `true` if the artifact exists afterwards (whether it was
    /// created now or was already present), `false` if the backend declined
    /// to create it.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn create_new(&self, name: &str) -> StorageResult<bool>;

    /// Removes the named artifact.
    ///
    /// Returns `true` if the artifact no longer exists afterwards, including
    /// the case where it never existed.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn remove(&self, name: &str) -> StorageResult<bool>;

    /// Opens the artifact for reading from the start.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if the artifact is missing.
    fn open_reader(&self, name: &str) -> StorageResult<Box<dyn Read + Send>>;

    /// Opens the artifact for writing, truncating any previous contents.
    ///
    /// Callers must `flush` the writer; only then are the bytes guaranteed
    /// to be complete (and durable, for persistent backends).
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be opened.
    fn open_writer(&self, name: &str) -> StorageResult<Box<dyn Write + Send>>;

    /// Moves `from` over `to`, replacing `to` if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if `from` is missing, or an
    /// I/O error if the move fails. On error `to` is left untouched.
    fn rename(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Returns the size of the named artifact in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if the artifact is missing.
    fn size(&self, name: &str) -> StorageResult<u64>;
}
