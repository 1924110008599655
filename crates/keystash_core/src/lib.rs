//! # KeyStash Core
//!
//! Observable value and list containers over atomically persisted keys.
//!
//! This crate provides:
//! - [`KeyValueStore`], the façade handing out typed containers by key
//! - [`ValueContainer`] for keys holding a single value
//! - [`ListContainer`] for keys holding an ordered list
//! - [`UpdateFeed`] subscriptions primed with the current state
//! - Detached (background) variants of every mutation
//!
//! Each key is an independent unit with its own lock and artifact. A
//! mutation holds the key's exclusive lock for its whole read, compute and
//! write sequence, so concurrent callers never lose updates. Writes go to
//! a temporary artifact that is renamed over the current one, so a reader
//! or a restarted process only ever sees a complete value.
//!
//! ## Example
//!
//! ```rust
//! use keystash_core::KeyValueStore;
//!
//! let store = KeyValueStore::open_in_memory()?;
//! let queue = store.list::<u32>("queue")?;
//!
//! let updates = queue.observe()?;
//! queue.append(1)?;
//! queue.append(2)?;
//! queue.remove(|n| *n == 1)?;
//!
//! assert_eq!(queue.get()?, vec![2]);
//! assert_eq!(updates.drain(), vec![vec![], vec![1], vec![1, 2], vec![2]]);
//! # Ok::<(), keystash_core::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod background;
mod config;
mod dir;
mod error;
mod feed;
mod list;
mod persist;
mod store;
mod value;

pub use background::{BackgroundExecutor, Pending};
pub use config::Config;
pub use dir::{StoreDir, LOCK_FILE};
pub use error::{StoreError, StoreResult};
pub use feed::{Subscription, UpdateFeed};
pub use list::ListContainer;
pub use store::KeyValueStore;
pub use value::{ValueContainer, ValueUpdate};

// Re-export the pieces callers need to pick a backend or a format
pub use keystash_codec::{CborConverter, CodecError, Converter, JsonConverter};
pub use keystash_storage::{FileBackend, InMemoryBackend, StorageBackend, StorageError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
