//! Per-unit reader/writer lock.
//!
//! Readers share the lock; every mutating path takes it exclusively for the
//! whole read-modify-write sequence. There is no in-place upgrade from a
//! shared to an exclusive hold, so two would-be upgraders can never wait on
//! each other.
//!
//! The lock remembers which thread holds it exclusively. That thread may
//! still read (a predicate reading its own key runs inside the writer's
//! hold), but a second exclusive acquisition from it is rejected with
//! [`StorageError::ReentrantWrite`] instead of deadlocking.

use crate::error::{StorageError, StorageResult};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Reader/writer lock guarding one storage unit.
///
/// With a timeout configured, acquisition gives up after that long and
/// reports [`StorageError::LockTimeout`]; without one it blocks until the
/// lock is available.
#[derive(Debug, Default)]
pub struct UnitLock {
    inner: RwLock<()>,
    timeout: Option<Duration>,
    writer: Mutex<Option<ThreadId>>,
}

/// A shared hold on a [`UnitLock`].
#[derive(Debug)]
pub struct ReadHold<'a> {
    guard: Option<RwLockReadGuard<'a, ()>>,
}

impl ReadHold<'_> {
    /// Returns whether this hold rides on the current thread's exclusive hold.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.guard.is_none()
    }
}

/// An exclusive hold on a [`UnitLock`].
#[derive(Debug)]
pub struct WriteHold<'a> {
    writer: &'a Mutex<Option<ThreadId>>,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl Drop for WriteHold<'_> {
    fn drop(&mut self) {
        // Cleared before the guard field releases the lock
        *self.writer.lock() = None;
    }
}

impl UnitLock {
    /// Creates a lock with an optional acquisition timeout.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            inner: RwLock::new(()),
            timeout,
            writer: Mutex::new(None),
        }
    }

    /// Acquires a shared hold.
    ///
    /// On the thread that holds the lock exclusively this succeeds at once
    /// without taking a second hold.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockTimeout`] if the timeout elapses first.
    pub fn read(&self, key: &str) -> StorageResult<ReadHold<'_>> {
        if self.held_by_current_thread() {
            return Ok(ReadHold { guard: None });
        }
        let guard = match self.timeout {
            None => self.inner.read(),
            Some(timeout) => self
                .inner
                .try_read_for(timeout)
                .ok_or_else(|| Self::timed_out(key, timeout))?,
        };
        Ok(ReadHold { guard: Some(guard) })
    }

    /// Acquires an exclusive hold.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReentrantWrite`] if the current thread already
    /// holds the lock exclusively, or [`StorageError::LockTimeout`] if the
    /// timeout elapses first.
    pub fn write(&self, key: &str) -> StorageResult<WriteHold<'_>> {
        if self.held_by_current_thread() {
            return Err(StorageError::ReentrantWrite {
                key: key.to_string(),
            });
        }
        let guard = match self.timeout {
            None => self.inner.write(),
            Some(timeout) => self
                .inner
                .try_write_for(timeout)
                .ok_or_else(|| Self::timed_out(key, timeout))?,
        };
        *self.writer.lock() = Some(thread::current().id());
        Ok(WriteHold {
            writer: &self.writer,
            _guard: guard,
        })
    }

    /// Returns whether any hold (shared or exclusive) is currently taken.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Returns whether an exclusive hold is currently taken.
    #[must_use]
    pub fn is_locked_exclusive(&self) -> bool {
        self.inner.is_locked_exclusive()
    }

    fn held_by_current_thread(&self) -> bool {
        *self.writer.lock() == Some(thread::current().id())
    }

    fn timed_out(key: &str, timeout: Duration) -> StorageError {
        StorageError::LockTimeout {
            key: key.to_string(),
            timeout,
        }
    }
}
