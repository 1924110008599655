//! Ordered-list container.
//!
//! Every mutation reads the current list, computes the new one and writes
//! it back inside a single exclusive lock hold, so concurrent mutations on
//! one key never lose updates. A key that was never written reads as an
//! empty list.

use crate::background::{BackgroundExecutor, Pending};
use crate::error::{StoreError, StoreResult};
use crate::feed::{Subscription, UpdateFeed};
use crate::persist;
use keystash_codec::{Converter, JsonConverter};
use keystash_storage::{ArtifactRead, StorageError, StorageUnit, WriteAccess};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// A key holding an ordered list of `T`.
///
/// Handles are cheap to clone; clones share the unit, the converter and the
/// update feed. Obtain one through
/// [`KeyValueStore::list`](crate::KeyValueStore::list).
///
/// Predicates locate elements by linear scan from the front. `replace`,
/// `add_or_replace` and `remove` act on the first match only; `remove_all`
/// acts on every match.
///
/// # Example
///
/// ```rust
/// use keystash_core::KeyValueStore;
///
/// let store = KeyValueStore::open_in_memory()?;
/// let tags = store.list::<String>("tags")?;
///
/// tags.append("a".into())?;
/// tags.append("b".into())?;
/// tags.add_or_replace("B".into(), |t| t == "b")?;
///
/// assert_eq!(tags.get()?, vec!["a".to_string(), "B".to_string()]);
/// # Ok::<(), keystash_core::StoreError>(())
/// ```
pub struct ListContainer<T, C = JsonConverter> {
    inner: Arc<ListInner<T, C>>,
}

struct ListInner<T, C> {
    unit: Arc<StorageUnit>,
    converter: Arc<C>,
    feed: UpdateFeed<Vec<T>>,
    executor: Arc<BackgroundExecutor>,
}

impl<T, C> Clone for ListContainer<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, C> std::fmt::Debug for ListContainer<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListContainer")
            .field("key", &self.inner.unit.key())
            .field("feed", &self.inner.feed)
            .finish()
    }
}

impl<T, C> ListInner<T, C>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    C: Converter,
{
    fn load<A: ArtifactRead>(&self, access: &A) -> StoreResult<Vec<T>> {
        Ok(persist::load(&*self.converter, access)?.unwrap_or_default())
    }

    /// Writes `list` and publishes it. Caller holds the write lock.
    fn commit(&self, access: &WriteAccess<'_>, list: &[T]) -> StoreResult<()> {
        persist::store(&*self.converter, access, list)?;
        debug!(key = %access.key(), len = list.len(), "committed list");
        self.feed.emit(list.to_vec());
        Ok(())
    }

    /// Runs a read-modify-write step under the exclusive lock.
    fn mutate<R, F>(&self, step: F) -> StoreResult<R>
    where
        F: FnOnce(&Self, &WriteAccess<'_>) -> StoreResult<R>,
    {
        self.unit
            .with_write_lock(|access| -> StoreResult<R> { step(self, access) })
    }
}

impl<T, C> ListContainer<T, C>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    C: Converter,
{
    pub(crate) fn new(
        unit: Arc<StorageUnit>,
        converter: Arc<C>,
        executor: Arc<BackgroundExecutor>,
    ) -> Self {
        Self {
            inner: Arc::new(ListInner {
                unit,
                converter,
                feed: UpdateFeed::new(),
                executor,
            }),
        }
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &str {
        self.inner.unit.key()
    }

    /// Reads the current list; empty if the key was never written.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock times out, the artifact cannot be read,
    /// or its content cannot be decoded.
    pub fn get(&self) -> StoreResult<Vec<T>> {
        let inner = &*self.inner;
        inner.unit.with_read_lock(|access| inner.load(access))
    }

    /// Replaces the whole list.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be created or replaced.
    pub fn put(&self, list: Vec<T>) -> StoreResult<Vec<T>> {
        self.inner.mutate(|inner, access| {
            inner.commit(access, &list)?;
            Ok(list)
        })
    }

    /// Appends `value` at the end and returns the resulting list.
    ///
    /// # Errors
    ///
    /// Returns an error if the current list cannot be read or the new one
    /// cannot be written.
    pub fn append(&self, value: T) -> StoreResult<Vec<T>> {
        self.inner.mutate(|inner, access| {
            let mut list = inner.load(access)?;
            list.push(value);
            inner.commit(access, &list)?;
            Ok(list)
        })
    }

    /// Replaces the first element matching `predicate` with `value`.
    ///
    /// Without a match nothing is written, but the unchanged list is still
    /// published and returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be read or written.
    pub fn replace<P>(&self, value: T, predicate: P) -> StoreResult<Vec<T>>
    where
        P: FnMut(&T) -> bool,
    {
        self.inner.mutate(|inner, access| {
            let mut list = inner.load(access)?;
            match list.iter().position(predicate) {
                Some(index) => {
                    list[index] = value;
                    inner.commit(access, &list)?;
                }
                None => inner.feed.emit(list.clone()),
            }
            Ok(list)
        })
    }

    /// Replaces the first element matching `predicate`, or appends `value`
    /// if none matches. Always writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be read or written.
    pub fn add_or_replace<P>(&self, value: T, predicate: P) -> StoreResult<Vec<T>>
    where
        P: FnMut(&T) -> bool,
    {
        self.inner.mutate(|inner, access| {
            let mut list = inner.load(access)?;
            match list.iter().position(predicate) {
                Some(index) => list[index] = value,
                None => list.push(value),
            }
            inner.commit(access, &list)?;
            Ok(list)
        })
    }

    /// Removes the first element matching `predicate`.
    ///
    /// Writes and publishes only if an element was removed. A key that was
    /// never written publishes an empty list without writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be read or written.
    pub fn remove<P>(&self, predicate: P) -> StoreResult<Vec<T>>
    where
        P: FnMut(&T) -> bool,
    {
        self.inner.mutate(|inner, access| {
            if !access.exists()? {
                inner.feed.emit(Vec::new());
                return Ok(Vec::new());
            }
            let mut list = inner.load(access)?;
            if let Some(index) = list.iter().position(predicate) {
                list.remove(index);
                inner.commit(access, &list)?;
            }
            Ok(list)
        })
    }

    /// Removes every element matching `predicate` and returns what is left.
    ///
    /// Writes and publishes only if at least one element was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be read or written.
    pub fn remove_all<P>(&self, mut predicate: P) -> StoreResult<Vec<T>>
    where
        P: FnMut(&T) -> bool,
    {
        self.inner.mutate(|inner, access| {
            let mut list = inner.load(access)?;
            let before = list.len();
            list.retain(|item| !predicate(item));
            if list.len() < before {
                inner.commit(access, &list)?;
            }
            Ok(list)
        })
    }

    /// Removes the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexOutOfBounds`] without writing if `index`
    /// is past the end, or an error if the list cannot be read or written.
    pub fn remove_at(&self, index: usize) -> StoreResult<Vec<T>> {
        self.inner.mutate(|inner, access| {
            let mut list = inner.load(access)?;
            if index >= list.len() {
                return Err(StoreError::index_out_of_bounds(index, list.len()));
            }
            list.remove(index);
            inner.commit(access, &list)?;
            Ok(list)
        })
    }

    /// Deletes the list and publishes an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing artifact cannot be deleted.
    pub fn clear(&self) -> StoreResult<()> {
        self.inner.mutate(|inner, access| {
            if access.exists()? && !access.delete()? {
                return Err(StorageError::DeleteFailed {
                    key: access.key().to_string(),
                }
                .into());
            }
            inner.feed.emit(Vec::new());
            Ok(())
        })
    }

    /// Subscribes to updates, starting with the current list.
    ///
    /// # Errors
    ///
    /// Returns an error if the priming read fails.
    pub fn observe(&self) -> StoreResult<Subscription<Vec<T>>> {
        let inner = &*self.inner;
        inner.unit.with_read_lock(|access| -> StoreResult<_> {
            let current = inner.load(access)?;
            debug!(key = %access.key(), "new list subscriber");
            Ok(inner.feed.subscribe_with(current))
        })
    }

    /// Runs `op` against this container on the background executor.
    pub fn detached<R, F>(&self, op: F) -> Pending<R>
    where
        R: Send + 'static,
        F: FnOnce(&Self) -> StoreResult<R> + Send + 'static,
    {
        let this = self.clone();
        self.inner.executor.submit(move || op(&this))
    }

    /// [`Self::put`] on the background executor.
    pub fn put_detached(&self, list: Vec<T>) -> Pending<Vec<T>> {
        self.detached(move |this| this.put(list))
    }

    /// [`Self::append`] on the background executor.
    pub fn append_detached(&self, value: T) -> Pending<Vec<T>> {
        self.detached(move |this| this.append(value))
    }

    /// [`Self::clear`] on the background executor.
    pub fn clear_detached(&self) -> Pending<()> {
        self.detached(Self::clear)
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.feed.subscriber_count()
    }
}

impl<T, C> ListContainer<T, C>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
    C: Converter,
{
    /// Removes the first element equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be read or written.
    pub fn remove_item(&self, value: &T) -> StoreResult<Vec<T>> {
        self.remove(|item| item == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystash_storage::InMemoryBackend;
    use serde::Deserialize;
    use std::thread;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Todo {
        id: u32,
        title: String,
    }

    fn todo(id: u32, title: &str) -> Todo {
        Todo {
            id,
            title: title.to_string(),
        }
    }

    fn container<T>(backend: Arc<InMemoryBackend>) -> ListContainer<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let unit = StorageUnit::new("todos", "json", backend, None).unwrap();
        let executor = Arc::new(BackgroundExecutor::new(2).unwrap());
        ListContainer::new(Arc::new(unit), Arc::new(JsonConverter::new()), executor)
    }

    fn fresh<T>() -> ListContainer<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        container(Arc::new(InMemoryBackend::new()))
    }

    #[test]
    fn never_written_is_empty() {
        let list = fresh::<Todo>();
        assert!(list.get().unwrap().is_empty());
    }

    #[test]
    fn put_then_get() {
        let list = fresh();
        list.put(vec![todo(1, "a"), todo(2, "b")]).unwrap();
        assert_eq!(list.get().unwrap(), vec![todo(1, "a"), todo(2, "b")]);
    }

    #[test]
    fn append_preserves_order() {
        let list = fresh();
        for i in 0..5u32 {
            list.append(i).unwrap();
        }
        assert_eq!(list.get().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn replace_first_match_only() {
        let list = fresh();
        list.put(vec![todo(1, "a"), todo(2, "b"), todo(1, "c")]).unwrap();

        let result = list.replace(todo(9, "z"), |t| t.id == 1).unwrap();
        assert_eq!(result, vec![todo(9, "z"), todo(2, "b"), todo(1, "c")]);
        assert_eq!(list.get().unwrap(), result);
    }

    #[test]
    fn predicate_may_read_its_own_key() {
        let list = fresh();
        list.put(vec![1u8, 2, 3]).unwrap();
        let reader = list.clone();

        let result = list
            .replace(9, |v| {
                assert_eq!(reader.get().unwrap(), vec![1, 2, 3]);
                *v == 2
            })
            .unwrap();
        assert_eq!(result, vec![1, 9, 3]);

        let remaining = list
            .remove_all(|v| reader.get().unwrap().first() == Some(v))
            .unwrap();
        assert_eq!(remaining, vec![9, 3]);
    }

    #[test]
    fn predicate_writing_its_own_key_is_rejected() {
        let list = fresh();
        list.put(vec![1u8]).unwrap();
        let writer = list.clone();

        let mut nested = None;
        list.add_or_replace(2, |_| {
            nested = Some(writer.append(5));
            false
        })
        .unwrap();

        assert!(matches!(
            nested,
            Some(Err(StoreError::Storage(StorageError::ReentrantWrite { .. })))
        ));
        assert_eq!(list.get().unwrap(), vec![1, 2]);
    }

    #[test]
    fn replace_without_match_publishes_unchanged() {
        let backend = Arc::new(InMemoryBackend::new());
        let list = container(backend.clone());
        let updates = list.observe().unwrap();

        let result = list.replace(7u8, |v| *v == 1).unwrap();
        assert!(result.is_empty());
        // Nothing written, but the unchanged list is published
        assert!(backend.names().is_empty());
        assert_eq!(updates.drain(), vec![Vec::<u8>::new(), Vec::new()]);
    }

    #[test]
    fn add_or_replace_appends_when_missing() {
        let list = fresh();
        list.put(vec![todo(1, "a")]).unwrap();

        let result = list.add_or_replace(todo(2, "b"), |t| t.id == 2).unwrap();
        assert_eq!(result, vec![todo(1, "a"), todo(2, "b")]);
    }

    #[test]
    fn add_or_replace_keeps_position() {
        let list = fresh();
        list.put(vec![todo(1, "a"), todo(2, "b"), todo(3, "c")]).unwrap();

        let result = list.add_or_replace(todo(2, "B"), |t| t.id == 2).unwrap();
        assert_eq!(result, vec![todo(1, "a"), todo(2, "B"), todo(3, "c")]);
    }

    #[test]
    fn add_or_replace_creates_key() {
        let backend = Arc::new(InMemoryBackend::new());
        let list = container(backend.clone());
        list.add_or_replace(1u8, |_| false).unwrap();
        assert_eq!(backend.names(), vec!["todos.json".to_string()]);
    }

    #[test]
    fn remove_first_versus_all() {
        let list = fresh();
        list.put(vec!["a", "b", "c"].into_iter().map(String::from).collect())
            .unwrap();
        let matches = |s: &String| s == "a" || s == "c";

        assert_eq!(list.remove(matches).unwrap(), vec!["b", "c"]);

        list.put(vec!["a", "b", "c"].into_iter().map(String::from).collect())
            .unwrap();
        assert_eq!(list.remove_all(matches).unwrap(), vec!["b"]);
    }

    #[test]
    fn remove_on_missing_key_publishes_empty() {
        let backend = Arc::new(InMemoryBackend::new());
        let list = container::<u8>(backend.clone());
        let updates = list.observe().unwrap();

        assert!(list.remove(|_| true).unwrap().is_empty());
        assert!(backend.names().is_empty());
        assert_eq!(updates.drain(), vec![Vec::<u8>::new(), Vec::new()]);
    }

    #[test]
    fn remove_without_match_is_silent() {
        let list = fresh();
        list.put(vec![1u8, 2]).unwrap();
        let updates = list.observe().unwrap();

        assert_eq!(list.remove(|v| *v == 9).unwrap(), vec![1, 2]);
        assert_eq!(list.remove_all(|v| *v == 9).unwrap(), vec![1, 2]);
        assert_eq!(updates.drain(), vec![vec![1, 2]]);
    }

    #[test]
    fn remove_item_by_equality() {
        let list = fresh();
        list.put(vec![3u8, 4, 3]).unwrap();
        assert_eq!(list.remove_item(&3).unwrap(), vec![4, 3]);
    }

    #[test]
    fn remove_at_bounds() {
        let list = fresh();
        list.put(vec![10u8, 20, 30]).unwrap();
        let updates = list.observe().unwrap();

        assert!(matches!(
            list.remove_at(3),
            Err(StoreError::IndexOutOfBounds { index: 3, len: 3 })
        ));
        assert_eq!(list.remove_at(1).unwrap(), vec![10, 30]);
        assert_eq!(updates.drain(), vec![vec![10, 20, 30], vec![10, 30]]);
    }

    #[test]
    fn remove_at_on_missing_key_fails() {
        let list = fresh::<u8>();
        assert!(matches!(
            list.remove_at(0),
            Err(StoreError::IndexOutOfBounds { index: 0, len: 0 })
        ));
    }

    #[test]
    fn clear_publishes_empty() {
        let backend = Arc::new(InMemoryBackend::new());
        let list = container(backend.clone());
        list.put(vec![1u8]).unwrap();
        let updates = list.observe().unwrap();

        list.clear().unwrap();
        list.clear().unwrap();

        assert!(backend.names().is_empty());
        assert_eq!(updates.drain(), vec![vec![1], vec![], vec![]]);
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let list = fresh::<u32>();
        let threads: Vec<_> = (0..8u32)
            .map(|t| {
                let list = list.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        list.append(t * 100 + i).unwrap();
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let mut items = list.get().unwrap();
        assert_eq!(items.len(), 200);
        items.sort_unstable();
        items.dedup();
        assert_eq!(items.len(), 200);
    }

    #[test]
    fn notifications_follow_commit_order() {
        let list = fresh::<u32>();
        let updates = list.observe().unwrap();

        let handles: Vec<_> = (0..20u32).map(|i| list.append_detached(i)).collect();
        for pending in handles {
            pending.wait().unwrap();
        }

        let seen = updates.drain();
        assert_eq!(seen.len(), 21);
        for (n, snapshot) in seen.iter().enumerate() {
            assert_eq!(snapshot.len(), n);
        }
    }

    #[test]
    fn detached_operations() {
        let list = fresh::<u8>();
        list.put_detached(vec![1, 2]).wait().unwrap();
        assert_eq!(list.append_detached(3).wait().unwrap(), vec![1, 2, 3]);
        assert_eq!(
            list.detached(|l| l.remove_all(|v| *v > 1)).wait().unwrap(),
            vec![1]
        );
        list.clear_detached().wait().unwrap();
        assert!(list.get().unwrap().is_empty());
    }
}
