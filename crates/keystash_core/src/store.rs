//! The store façade.
//!
//! A [`KeyValueStore`] binds a backend, a converter and a configuration,
//! and hands out typed containers by key. Containers for the same key and
//! type are cached, so every handle on a key shares one lock and one feed.

use crate::background::BackgroundExecutor;
use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::StoreResult;
use crate::list::ListContainer;
use crate::value::ValueContainer;
use keystash_codec::{Converter, JsonConverter};
use keystash_storage::{FileBackend, InMemoryBackend, StorageBackend, StorageUnit};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// An embedded store of independently locked, atomically persisted keys.
///
/// # Example
///
/// ```rust,no_run
/// use keystash_core::{Config, KeyValueStore};
/// use std::path::Path;
///
/// let store = KeyValueStore::open_with_config(
///     Path::new("app_data"),
///     Config::default().pretty_json(true),
/// )?;
///
/// let visits = store.value::<u64>("visits")?;
/// let current = visits.get()?.unwrap_or(0);
/// visits.put(current + 1)?;
///
/// let history = store.list::<String>("history")?;
/// history.append("opened".to_string())?;
/// # Ok::<(), keystash_core::StoreError>(())
/// ```
pub struct KeyValueStore<C = JsonConverter> {
    backend: Arc<dyn StorageBackend>,
    converter: Arc<C>,
    config: Config,
    executor: Arc<BackgroundExecutor>,
    slots: Mutex<HashMap<String, Arc<KeySlot>>>,
    /// Held for its directory lock.
    dir: Option<StoreDir>,
}

/// Everything the store keeps for one key.
struct KeySlot {
    unit: Arc<StorageUnit>,
    /// Container handles by container type.
    handles: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl KeyValueStore<JsonConverter> {
    /// Opens a file-backed JSON store with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or is locked by
    /// another process.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a file-backed JSON store.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or is locked by
    /// another process.
    pub fn open_with_config(path: &Path, config: Config) -> StoreResult<Self> {
        let converter = if config.pretty_json {
            JsonConverter::pretty()
        } else {
            JsonConverter::new()
        };
        KeyValueStore::open_with_converter(path, converter, config)
    }

    /// Creates a JSON store that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the background executor cannot start.
    pub fn open_in_memory() -> StoreResult<Self> {
        KeyValueStore::with_backend(
            Arc::new(InMemoryBackend::new()),
            JsonConverter::new(),
            Config::default(),
        )
    }
}

impl<C: Converter> KeyValueStore<C> {
    /// Opens a file-backed store using `converter`.
    ///
    /// With `config.lock_directory` set, temporary artifacts left behind by
    /// an interrupted process are removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or is locked by
    /// another process.
    pub fn open_with_converter(path: &Path, converter: C, config: Config) -> StoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing, config.lock_directory)?;
        let backend = FileBackend::open(dir.path(), false)?.sync_writes(config.sync_writes);

        // Without the directory lock another process may be mid-replace
        if dir.is_locked() {
            let removed = backend.remove_stale_temporaries()?;
            if removed > 0 {
                info!(removed, path = %path.display(), "removed stale temporary artifacts");
            }
        }

        let mut store = Self::with_backend(Arc::new(backend), converter, config)?;
        store.dir = Some(dir);
        Ok(store)
    }

    /// Creates a store over an arbitrary backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the background executor cannot start.
    pub fn with_backend(
        backend: Arc<dyn StorageBackend>,
        converter: C,
        config: Config,
    ) -> StoreResult<Self> {
        let executor = Arc::new(BackgroundExecutor::new(config.background_threads)?);
        debug!(extension = converter.extension(), "store opened");
        Ok(Self {
            backend,
            converter: Arc::new(converter),
            config,
            executor,
            slots: Mutex::new(HashMap::new()),
            dir: None,
        })
    }

    /// Returns the value container for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` cannot name an artifact.
    pub fn value<T>(&self, key: &str) -> StoreResult<ValueContainer<T, C>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.handle(key, |unit| {
            ValueContainer::new(unit, Arc::clone(&self.converter), Arc::clone(&self.executor))
        })
    }

    /// Returns the list container for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` cannot name an artifact.
    pub fn list<T>(&self, key: &str) -> StoreResult<ListContainer<T, C>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.handle(key, |unit| {
            ListContainer::new(unit, Arc::clone(&self.converter), Arc::clone(&self.executor))
        })
    }

    fn handle<H, F>(&self, key: &str, make: F) -> StoreResult<H>
    where
        H: Clone + Send + Sync + 'static,
        F: FnOnce(Arc<StorageUnit>) -> H,
    {
        let slot = self.slot(key)?;
        let mut handles = slot.handles.lock();
        let id = TypeId::of::<H>();

        if let Some(existing) = handles.get(&id).and_then(|h| h.downcast_ref::<H>()) {
            return Ok(existing.clone());
        }

        let created = make(Arc::clone(&slot.unit));
        handles.insert(id, Box::new(created.clone()));
        Ok(created)
    }

    fn slot(&self, key: &str) -> StoreResult<Arc<KeySlot>> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            return Ok(Arc::clone(slot));
        }

        let unit = StorageUnit::new(
            key,
            self.converter.extension(),
            Arc::clone(&self.backend),
            self.config.lock_timeout,
        )?;
        let slot = Arc::new(KeySlot {
            unit: Arc::new(unit),
            handles: Mutex::new(HashMap::new()),
        });
        slots.insert(key.to_string(), Arc::clone(&slot));
        Ok(slot)
    }

    /// Returns the store directory for file-backed stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// Returns the configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the converter.
    #[must_use]
    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Returns the number of detached operations not yet finished.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.executor.queued()
    }

    /// Waits for queued detached operations and stops the executor.
    ///
    /// Detached operations submitted afterwards fail with
    /// [`StoreError::ExecutorShutDown`](crate::StoreError::ExecutorShutDown);
    /// direct calls keep working.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }
}

impl<C> std::fmt::Debug for KeyValueStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("backend", &self.backend)
            .field("config", &self.config)
            .field("keys", &self.slots.lock().len())
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}
