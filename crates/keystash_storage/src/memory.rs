//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

type Artifacts = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// An in-memory storage backend.
///
/// This backend stores all artifacts in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use keystash_storage::{InMemoryBackend, StorageBackend};
/// use std::io::Write;
///
/// let backend = InMemoryBackend::new();
/// let mut writer = backend.open_writer("a.json").unwrap();
/// writer.write_all(b"[1,2]").unwrap();
/// writer.flush().unwrap();
/// drop(writer);
/// assert_eq!(backend.contents("a.json").unwrap(), b"[1,2]");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    artifacts: Artifacts,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with one pre-existing artifact.
    ///
    /// Useful for testing recovery and corrupt-content scenarios.
    #[must_use]
    pub fn with_artifact(name: impl Into<String>, data: Vec<u8>) -> Self {
        let backend = Self::new();
        backend.artifacts.write().insert(name.into(), data);
        backend
    }

    /// Returns a copy of an artifact's bytes, if present.
    #[must_use]
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.artifacts.read().get(name).cloned()
    }

    /// Returns the names of all artifacts, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.artifacts.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes every artifact.
    pub fn clear(&self) {
        self.artifacts.write().clear();
    }
}

impl StorageBackend for InMemoryBackend {
    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.artifacts.read().contains_key(name))
    }

    fn create_new(&self, name: &str) -> StorageResult<bool> {
        self.artifacts.write().entry(name.to_string()).or_default();
        Ok(true)
    }

    fn remove(&self, name: &str) -> StorageResult<bool> {
        self.artifacts.write().remove(name);
        Ok(true)
    }

    fn open_reader(&self, name: &str) -> StorageResult<Box<dyn Read + Send>> {
        let data = self
            .contents(name)
            .ok_or_else(|| StorageError::not_found(name))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn open_writer(&self, name: &str) -> StorageResult<Box<dyn Write + Send>> {
        self.artifacts.write().insert(name.to_string(), Vec::new());
        Ok(Box::new(MemorySink {
            artifacts: Arc::clone(&self.artifacts),
            name: name.to_string(),
        }))
    }

    fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let mut artifacts = self.artifacts.write();
        let data = artifacts
            .remove(from)
            .ok_or_else(|| StorageError::not_found(from))?;
        artifacts.insert(to.to_string(), data);
        Ok(())
    }

    fn size(&self, name: &str) -> StorageResult<u64> {
        self.artifacts
            .read()
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| StorageError::not_found(name))
    }
}

/// Writer that appends straight into the shared artifact map.
struct MemorySink {
    artifacts: Artifacts,
    name: String,
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.artifacts
            .write()
            .entry(self.name.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Writes land in the map immediately
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(backend: &InMemoryBackend, name: &str) -> Vec<u8> {
        let mut data = Vec::new();
        backend
            .open_reader(name)
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        data
    }

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.names().is_empty());
        assert!(!backend.exists("a.json").unwrap());
    }

    #[test]
    fn memory_create_new_is_idempotent() {
        let backend = InMemoryBackend::with_artifact("a.json", b"keep".to_vec());
        assert!(backend.create_new("a.json").unwrap());
        assert_eq!(backend.contents("a.json").unwrap(), b"keep");

        assert!(backend.create_new("b.json").unwrap());
        assert_eq!(backend.size("b.json").unwrap(), 0);
    }

    #[test]
    fn memory_write_then_read() {
        let backend = InMemoryBackend::new();
        let mut writer = backend.open_writer("a.json").unwrap();
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        writer.flush().unwrap();

        assert_eq!(read_all(&backend, "a.json"), b"hello world");
    }

    #[test]
    fn memory_writer_truncates() {
        let backend = InMemoryBackend::with_artifact("a.json", b"old contents".to_vec());
        let mut writer = backend.open_writer("a.json").unwrap();
        writer.write_all(b"new").unwrap();

        assert_eq!(read_all(&backend, "a.json"), b"new");
    }

    #[test]
    fn memory_read_missing_fails() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.open_reader("missing.json"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn memory_remove_missing_reports_absent() {
        let backend = InMemoryBackend::new();
        assert!(backend.remove("missing.json").unwrap());
    }

    #[test]
    fn memory_rename_replaces_destination() {
        let backend = InMemoryBackend::with_artifact("a.json", b"old".to_vec());
        backend.open_writer("a.json.tmp").unwrap().write_all(b"new").unwrap();

        backend.rename("a.json.tmp", "a.json").unwrap();

        assert_eq!(backend.contents("a.json").unwrap(), b"new");
        assert!(!backend.exists("a.json.tmp").unwrap());
    }

    #[test]
    fn memory_rename_missing_source_keeps_destination() {
        let backend = InMemoryBackend::with_artifact("a.json", b"old".to_vec());
        assert!(backend.rename("a.json.tmp", "a.json").is_err());
        assert_eq!(backend.contents("a.json").unwrap(), b"old");
    }

    #[test]
    fn memory_clear() {
        let backend = InMemoryBackend::with_artifact("a.json", b"x".to_vec());
        backend.clear();
        assert!(backend.names().is_empty());
    }
}
