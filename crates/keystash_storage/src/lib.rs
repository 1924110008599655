//! # KeyStash Storage
//!
//! Artifact backends and per-key storage units for KeyStash.
//!
//! This crate provides the lowest-level persistence layer. Backends are
//! **opaque named-blob stores**: they do not interpret the bytes they hold.
//! A [`StorageUnit`] binds one key to one artifact on a backend and owns the
//! lock that serializes access to it.
//!
//! ## Design Principles
//!
//! - Backends store whole artifacts by name (create, read, write, rename, remove)
//! - An artifact at rest always holds one complete serialization
//! - Replacement goes through a temporary artifact that is renamed into place
//! - Mutations are only reachable while holding the unit's exclusive lock
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use keystash_storage::{ArtifactRead, InMemoryBackend, StorageResult, StorageUnit};
//! use std::io::{Read, Write};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(InMemoryBackend::new());
//! let unit = StorageUnit::new("greeting", "json", backend, None).unwrap();
//!
//! let written: StorageResult<()> = unit.with_write_lock(|access| {
//!     access.create_if_absent()?;
//!     access.atomic_replace(|sink: &mut dyn Write| -> StorageResult<()> {
//!         Ok(sink.write_all(b"\"hello\"")?)
//!     })
//! });
//! written.unwrap();
//!
//! let text = unit
//!     .with_read_lock(|access| -> StorageResult<String> {
//!         let mut text = String::new();
//!         access.open_reader()?.read_to_string(&mut text)?;
//!         Ok(text)
//!     })
//!     .unwrap();
//! assert_eq!(text, "\"hello\"");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod key;
mod lock;
mod memory;
mod unit;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use key::{artifact_name, temp_name, validate_key, TEMP_SUFFIX};
pub use lock::{ReadHold, UnitLock, WriteHold};
pub use memory::InMemoryBackend;
pub use unit::{ArtifactRead, ReadAccess, StorageUnit, WriteAccess};
