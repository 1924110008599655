//! Error types for KeyStash core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in container and store operations.
///
/// Every failure is surfaced to the caller of the operation that hit it;
/// nothing is retried. The only non-error "failure" is an empty artifact,
/// which reads as absent (value) or empty (list).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend or unit error (create, delete, replace, lock).
    #[error("storage error: {0}")]
    Storage(#[from] keystash_storage::StorageError),

    /// Converter error.
    #[error("codec error: {0}")]
    Codec(#[from] keystash_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A list position was outside the list.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds {
        /// The requested position.
        index: usize,
        /// The list length at the time of the request.
        len: usize,
    },

    /// Another process holds the store directory.
    #[error("store directory locked: another process has exclusive access to {}", path.display())]
    DirectoryLocked {
        /// The locked directory.
        path: PathBuf,
    },

    /// The background executor no longer accepts work.
    #[error("background executor is shut down")]
    ExecutorShutDown,

    /// A background operation panicked before producing a result.
    #[error("background operation panicked")]
    TaskPanicked,
}

impl StoreError {
    /// Creates an index-out-of-bounds error.
    pub fn index_out_of_bounds(index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds { index, len }
    }
}
