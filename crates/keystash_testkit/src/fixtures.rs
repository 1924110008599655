//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use keystash_core::{Config, KeyValueStore};
use std::path::Path;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: KeyValueStore,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: KeyValueStore::open_in_memory().expect("Failed to open in-memory store"),
            temp_dir: None,
        }
    }

    /// Creates a new file-backed test store in a temporary directory.
    ///
    /// Writes are not fsynced, which keeps tests fast without changing
    /// what a reopened store sees.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = KeyValueStore::open_with_config(temp_dir.path(), Self::file_config())
            .expect("Failed to open file store");
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }

    /// Simulates a process restart: drops the store and opens the same
    /// directory again.
    ///
    /// # Panics
    ///
    /// Panics if the store is in-memory.
    #[must_use]
    pub fn reopen(self) -> Self {
        let Self { store, temp_dir } = self;
        let temp_dir = temp_dir.expect("Only file stores can be reopened");
        drop(store);

        let store = KeyValueStore::open_with_config(temp_dir.path(), Self::file_config())
            .expect("Failed to reopen file store");
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory if file-backed, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    fn file_config() -> Config {
        Config::default().sync_writes(false)
    }
}

impl std::ops::Deref for TestStore {
    type Target = KeyValueStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust
/// use keystash_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     let list = store.list::<u32>("numbers").unwrap();
///     list.append(1).unwrap();
///     assert_eq!(list.get().unwrap(), vec![1]);
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&KeyValueStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&KeyValueStore, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use serde::{Deserialize, Serialize};

    /// A small record used by scenario helpers and tests.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Item {
        /// Identifier used by predicates.
        pub id: u32,
        /// Payload.
        pub label: String,
    }

    impl Item {
        /// Creates an item.
        pub fn new(id: u32, label: impl Into<String>) -> Self {
            Self {
                id,
                label: label.into(),
            }
        }
    }

    /// Creates a store whose `"items"` list holds `count` items with ids `0..count`.
    pub fn populated_list(count: u32) -> TestStore {
        let test_store = TestStore::memory();
        let items = (0..count).map(|i| Item::new(i, format!("item-{i}"))).collect();
        test_store
            .list::<Item>("items")
            .expect("Failed to open list")
            .put(items)
            .expect("Failed to populate list");
        test_store
    }

    /// Creates a store with `key_count` value keys `key_0..key_n`, each
    /// holding its own index.
    pub fn many_values(key_count: usize) -> TestStore {
        let test_store = TestStore::memory();
        for i in 0..key_count {
            test_store
                .value::<usize>(&format!("key_{i}"))
                .expect("Failed to open value")
                .put(i)
                .expect("Failed to put value");
        }
        test_store
    }
}

#[cfg(test)]
mod tests {
    use super::scenarios::{self, Item};
    use super::*;

    #[test]
    fn memory_store() {
        let test_store = TestStore::memory();
        assert!(test_store.path().is_none());
        assert_eq!(test_store.value::<u8>("k").unwrap().get().unwrap(), None);
    }

    #[test]
    fn file_store_reopens() {
        let test_store = TestStore::file();
        test_store.value::<String>("k").unwrap().put("v".into()).unwrap();

        let test_store = test_store.reopen();
        assert_eq!(
            test_store.value::<String>("k").unwrap().get().unwrap().as_deref(),
            Some("v")
        );
    }

    #[test]
    fn with_file_store_exposes_path() {
        with_file_store(|store, path| {
            store.list::<u8>("k").unwrap().append(1).unwrap();
            assert!(path.join("k.json").exists());
        });
    }

    #[test]
    fn populated_scenario() {
        let test_store = scenarios::populated_list(5);
        let items = test_store.list::<Item>("items").unwrap().get().unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[4], Item::new(4, "item-4"));
    }

    #[test]
    fn many_values_scenario() {
        let test_store = scenarios::many_values(3);
        assert_eq!(test_store.value::<usize>("key_2").unwrap().get().unwrap(), Some(2));
    }
}
