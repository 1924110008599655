//! Fault injection for storage backends.
//!
//! [`FaultyBackend`] wraps a real backend and fails chosen operations on
//! demand, so tests can check that every failure path leaves the last
//! committed value visible and publishes nothing.
//!
//! ## Usage
//!
//! ```rust
//! use keystash_core::{Config, JsonConverter, KeyValueStore};
//! use keystash_testkit::{Fault, FaultyBackend};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(FaultyBackend::in_memory());
//! let store =
//!     KeyValueStore::with_backend(backend.clone(), JsonConverter::new(), Config::default())?;
//! let value = store.value::<u32>("n")?;
//!
//! value.put(1)?;
//! backend.inject(Fault::Rename);
//! assert!(value.put(2).is_err());
//! assert_eq!(value.get()?, Some(1));
//! # Ok::<(), keystash_core::StoreError>(())
//! ```

use keystash_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// An operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `create_new` reports that the artifact could not be created.
    Create,
    /// `remove` reports that the artifact is still present.
    Remove,
    /// `rename` fails with an I/O error.
    Rename,
    /// `rename` moves the artifact, then reports an I/O error, as a failed
    /// directory sync would.
    RenameAfterMove,
    /// Writers fail on their first write.
    Write,
    /// Writers fail on flush.
    Flush,
}

#[derive(Debug, Default)]
struct Faults {
    create: AtomicBool,
    remove: AtomicBool,
    rename: AtomicBool,
    rename_after_move: AtomicBool,
    write: AtomicBool,
    flush: AtomicBool,
    triggered: AtomicUsize,
}

impl Faults {
    fn flag(&self, fault: Fault) -> &AtomicBool {
        match fault {
            Fault::Create => &self.create,
            Fault::Remove => &self.remove,
            Fault::Rename => &self.rename,
            Fault::RenameAfterMove => &self.rename_after_move,
            Fault::Write => &self.write,
            Fault::Flush => &self.flush,
        }
    }

    fn hit(&self, fault: Fault) -> bool {
        let active = self.flag(fault).load(Ordering::SeqCst);
        if active {
            self.triggered.fetch_add(1, Ordering::SeqCst);
        }
        active
    }
}

/// A storage backend wrapper that fails chosen operations.
#[derive(Debug)]
pub struct FaultyBackend {
    inner: Arc<dyn StorageBackend>,
    faults: Arc<Faults>,
}

impl FaultyBackend {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Wraps a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// Makes `fault` fire on every matching operation until healed.
    pub fn inject(&self, fault: Fault) {
        self.faults.flag(fault).store(true, Ordering::SeqCst);
    }

    /// Stops `fault` from firing.
    pub fn heal(&self, fault: Fault) {
        self.faults.flag(fault).store(false, Ordering::SeqCst);
    }

    /// Stops every fault from firing.
    pub fn heal_all(&self) {
        for fault in [
            Fault::Create,
            Fault::Remove,
            Fault::Rename,
            Fault::RenameAfterMove,
            Fault::Write,
            Fault::Flush,
        ] {
            self.heal(fault);
        }
    }

    /// Returns how many operations have failed on purpose.
    pub fn triggered(&self) -> usize {
        self.faults.triggered.load(Ordering::SeqCst)
    }

    /// Returns whether the wrapped backend holds `name`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped backend's error.
    pub fn inner_exists(&self, name: &str) -> StorageResult<bool> {
        self.inner.exists(name)
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected {what} failure"))
}

impl StorageBackend for FaultyBackend {
    fn exists(&self, name: &str) -> StorageResult<bool> {
        self.inner.exists(name)
    }

    fn create_new(&self, name: &str) -> StorageResult<bool> {
        if self.faults.hit(Fault::Create) {
            return Ok(false);
        }
        self.inner.create_new(name)
    }

    fn remove(&self, name: &str) -> StorageResult<bool> {
        if self.faults.hit(Fault::Remove) {
            return Ok(false);
        }
        self.inner.remove(name)
    }

    fn open_reader(&self, name: &str) -> StorageResult<Box<dyn Read + Send>> {
        self.inner.open_reader(name)
    }

    fn open_writer(&self, name: &str) -> StorageResult<Box<dyn Write + Send>> {
        let inner = self.inner.open_writer(name)?;
        Ok(Box::new(FaultyWriter {
            inner,
            faults: Arc::clone(&self.faults),
        }))
    }

    fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        if self.faults.hit(Fault::Rename) {
            return Err(StorageError::Io(injected("rename")));
        }
        self.inner.rename(from, to)?;
        if self.faults.hit(Fault::RenameAfterMove) {
            return Err(StorageError::Io(injected("post-rename sync")));
        }
        Ok(())
    }

    fn size(&self, name: &str) -> StorageResult<u64> {
        self.inner.size(name)
    }
}

struct FaultyWriter {
    inner: Box<dyn Write + Send>,
    faults: Arc<Faults>,
}

impl Write for FaultyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.faults.hit(Fault::Write) {
            // Leave a torn prefix behind, as an interrupted write would
            let half = buf.len() / 2;
            self.inner.write_all(&buf[..half])?;
            return Err(injected("write"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.faults.hit(Fault::Flush) {
            return Err(injected("flush"));
        }
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::scenarios::Item;
    use keystash_core::{Config, JsonConverter, KeyValueStore, StoreError, ValueUpdate};

    fn faulty_store() -> (Arc<FaultyBackend>, KeyValueStore) {
        let backend = Arc::new(FaultyBackend::in_memory());
        let store =
            KeyValueStore::with_backend(backend.clone(), JsonConverter::new(), Config::default())
                .unwrap();
        (backend, store)
    }

    #[test]
    fn failed_create_writes_nothing() {
        let (backend, store) = faulty_store();
        let value = store.value::<u32>("n").unwrap();
        let updates = value.observe().unwrap();

        backend.inject(Fault::Create);
        assert!(matches!(
            value.put(1),
            Err(StoreError::Storage(StorageError::CreateFailed { .. }))
        ));
        assert!(!backend.exists("n.json").unwrap());
        assert_eq!(updates.drain(), vec![ValueUpdate::Cleared]);
    }

    #[test]
    fn failed_rename_keeps_previous_value() {
        let (backend, store) = faulty_store();
        let list = store.list::<Item>("items").unwrap();
        list.append(Item::new(1, "kept")).unwrap();
        let updates = list.observe().unwrap();

        backend.inject(Fault::Rename);
        let result = list.append(Item::new(2, "lost"));
        assert!(matches!(
            result,
            Err(StoreError::Storage(StorageError::ReplaceFailed { .. }))
        ));

        assert_eq!(list.get().unwrap(), vec![Item::new(1, "kept")]);
        assert!(!backend.exists("items.json.tmp").unwrap());
        // Only the priming snapshot
        assert_eq!(updates.drain().len(), 1);
    }

    #[test]
    fn rename_error_after_move_still_commits_and_notifies() {
        let (backend, store) = faulty_store();
        let list = store.list::<u8>("late").unwrap();
        list.append(1).unwrap();
        let updates = list.observe().unwrap();

        backend.inject(Fault::RenameAfterMove);
        assert_eq!(list.append(2).unwrap(), vec![1, 2]);
        assert_eq!(backend.triggered(), 1);

        assert_eq!(list.get().unwrap(), vec![1, 2]);
        assert_eq!(updates.drain(), vec![vec![1], vec![1, 2]]);
        assert!(!backend.exists("late.json.tmp").unwrap());
    }

    #[test]
    fn torn_write_is_never_visible() {
        let (backend, store) = faulty_store();
        let value = store.value::<String>("s").unwrap();
        value.put("committed".into()).unwrap();

        backend.inject(Fault::Write);
        assert!(value.put("x".repeat(64)).is_err());
        backend.heal(Fault::Write);

        assert_eq!(value.get().unwrap().as_deref(), Some("committed"));
        assert!(backend.triggered() >= 1);
    }

    #[test]
    fn failed_flush_keeps_previous_value() {
        let (backend, store) = faulty_store();
        let value = store.value::<u8>("b").unwrap();
        value.put(1).unwrap();

        backend.inject(Fault::Flush);
        assert!(matches!(value.put(2), Err(StoreError::Storage(StorageError::Io(_)))));
        backend.heal_all();

        assert_eq!(value.get().unwrap(), Some(1));
        assert_eq!(value.put(3).unwrap(), 3);
    }

    #[test]
    fn failed_delete_is_reported() {
        let (backend, store) = faulty_store();
        let value = store.value::<u8>("d").unwrap();
        value.put(5).unwrap();
        let updates = value.observe().unwrap();

        backend.inject(Fault::Remove);
        assert!(matches!(
            value.clear(),
            Err(StoreError::Storage(StorageError::DeleteFailed { .. }))
        ));
        assert_eq!(value.get().unwrap(), Some(5));
        assert_eq!(updates.drain(), vec![ValueUpdate::Present(5)]);

        let list = store.list::<u8>("d").unwrap();
        assert!(list.clear().is_err());
    }

    #[test]
    fn clear_of_absent_key_never_deletes() {
        let (backend, store) = faulty_store();
        backend.inject(Fault::Remove);

        store.value::<u8>("never").unwrap().clear().unwrap();
        store.list::<u8>("never").unwrap().clear().unwrap();
        assert_eq!(backend.triggered(), 0);
    }

    #[test]
    fn inner_view_matches() {
        let (backend, store) = faulty_store();
        store.value::<u8>("k").unwrap().put(0).unwrap();
        assert!(backend.inner_exists("k.json").unwrap());
    }
}
