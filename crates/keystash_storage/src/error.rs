//! Error types for storage operations.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The named artifact does not exist.
    #[error("artifact not found: {name}")]
    NotFound {
        /// The artifact name that was requested.
        name: String,
    },

    /// The artifact for a key did not exist and could not be created.
    #[error("could not create artifact for key {key:?}")]
    CreateFailed {
        /// The key whose artifact could not be created.
        key: String,
    },

    /// An existing artifact could not be removed.
    #[error("could not delete artifact for key {key:?}")]
    DeleteFailed {
        /// The key whose artifact could not be removed.
        key: String,
    },

    /// The temporary artifact could not be moved into place.
    ///
    /// The previous artifact is still the visible one.
    #[error("could not replace artifact for key {key:?}: {reason}")]
    ReplaceFailed {
        /// The key being replaced.
        key: String,
        /// The underlying cause.
        reason: String,
    },

    /// The key cannot be mapped to an artifact name.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why the key was rejected.
        reason: &'static str,
    },

    /// The thread holding a unit's exclusive lock tried to take it again.
    ///
    /// This happens when a predicate or callback running inside a mutation
    /// mutates the same key.
    #[error("key {key:?} is already being written by this thread")]
    ReentrantWrite {
        /// The key being written.
        key: String,
    },

    /// The unit lock could not be acquired in time.
    #[error("timed out after {timeout:?} waiting for lock on key {key:?}")]
    LockTimeout {
        /// The key whose lock was contended.
        key: String,
        /// The configured acquisition timeout.
        timeout: Duration,
    },
}

impl StorageError {
    /// Creates a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates a replace-failed error.
    pub fn replace_failed(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::ReplaceFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an invalid-key error.
    pub fn invalid_key(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }
}
