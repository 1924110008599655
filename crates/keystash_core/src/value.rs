//! Single-value container.

use crate::background::{BackgroundExecutor, Pending};
use crate::error::StoreResult;
use crate::feed::{Subscription, UpdateFeed};
use crate::persist;
use keystash_codec::{Converter, JsonConverter};
use keystash_storage::{ArtifactRead, StorageError, StorageUnit};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// State of a value key after a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueUpdate<T> {
    /// The key holds this value.
    Present(T),
    /// The key holds nothing.
    Cleared,
}

impl<T> ValueUpdate<T> {
    /// Returns the value, if present.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Cleared => None,
        }
    }

    /// Returns a reference to the value, if present.
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Cleared => None,
        }
    }

    /// Returns `true` for [`ValueUpdate::Cleared`].
    pub fn is_cleared(&self) -> bool {
        matches!(self, Self::Cleared)
    }
}

impl<T> From<Option<T>> for ValueUpdate<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Cleared, Self::Present)
    }
}

/// A key holding at most one value of type `T`.
///
/// Handles are cheap to clone; clones share the unit, the converter and the
/// update feed. Obtain one through
/// [`KeyValueStore::value`](crate::KeyValueStore::value).
///
/// # Example
///
/// ```rust
/// use keystash_core::{KeyValueStore, ValueUpdate};
///
/// let store = KeyValueStore::open_in_memory()?;
/// let theme = store.value::<String>("theme")?;
///
/// let updates = theme.observe()?;
/// theme.put("dark".to_string())?;
/// theme.clear()?;
///
/// assert_eq!(
///     updates.drain(),
///     vec![
///         ValueUpdate::Cleared,
///         ValueUpdate::Present("dark".to_string()),
///         ValueUpdate::Cleared,
///     ]
/// );
/// # Ok::<(), keystash_core::StoreError>(())
/// ```
pub struct ValueContainer<T, C = JsonConverter> {
    inner: Arc<ValueInner<T, C>>,
}

struct ValueInner<T, C> {
    unit: Arc<StorageUnit>,
    converter: Arc<C>,
    feed: UpdateFeed<ValueUpdate<T>>,
    executor: Arc<BackgroundExecutor>,
}

impl<T, C> Clone for ValueContainer<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, C> std::fmt::Debug for ValueContainer<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueContainer")
            .field("key", &self.inner.unit.key())
            .field("feed", &self.inner.feed)
            .finish()
    }
}

impl<T, C> ValueContainer<T, C>
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
            inner: Arc::new(ValueInner {
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

    /// Reads the current value.
    ///
    /// A missing or empty artifact reads as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock times out, the artifact cannot be read,
    /// or its content cannot be decoded.
    pub fn get(&self) -> StoreResult<Option<T>> {
        let inner = &*self.inner;
        inner
            .unit
            .with_read_lock(|access| persist::load(&*inner.converter, access))
    }

    /// Stores `value`, publishes it and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be created or replaced; the
    /// previous value stays in place and nothing is published.
    pub fn put(&self, value: T) -> StoreResult<T> {
        let inner = &*self.inner;
        inner.unit.with_write_lock(|access| -> StoreResult<T> {
            persist::store(&*inner.converter, access, &value)?;
            debug!(key = %access.key(), "committed value");
            inner.feed.emit(ValueUpdate::Present(value.clone()));
            Ok(value)
        })
    }

    /// Removes the value and publishes [`ValueUpdate::Cleared`].
    ///
    /// Clearing an absent key succeeds and still publishes.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing artifact cannot be deleted.
    pub fn clear(&self) -> StoreResult<()> {
        let inner = &*self.inner;
        inner.unit.with_write_lock(|access| -> StoreResult<()> {
            if access.exists()? && !access.delete()? {
                return Err(StorageError::DeleteFailed {
                    key: access.key().to_string(),
                }
                .into());
            }
            inner.feed.emit(ValueUpdate::Cleared);
            Ok(())
        })
    }

    /// Subscribes to updates, starting with the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the priming read fails.
    pub fn observe(&self) -> StoreResult<Subscription<ValueUpdate<T>>> {
        let inner = &*self.inner;
        inner.unit.with_read_lock(|access| -> StoreResult<_> {
            let current: Option<T> = persist::load(&*inner.converter, access)?;
            debug!(key = %access.key(), "new value subscriber");
            Ok(inner.feed.subscribe_with(current.into()))
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
    pub fn put_detached(&self, value: T) -> Pending<T> {
        self.detached(move |this| this.put(value))
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
