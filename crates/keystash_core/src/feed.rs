//! Update feed for observing committed mutations of one key.
//!
//! Each container owns one feed. After every successful commit the
//! container emits the key's new state, and the feed fans it out to every
//! live subscriber. The feed keeps no history: a new subscriber is primed
//! with a single snapshot taken at subscription time instead.
//!
//! # Usage
//!
//! ```rust
//! use keystash_core::UpdateFeed;
//!
//! let feed: UpdateFeed<Vec<u32>> = UpdateFeed::new();
//! let subscription = feed.subscribe_with(vec![]);
//!
//! feed.emit(vec![1]);
//! feed.emit(vec![1, 2]);
//!
//! let seen: Vec<Vec<u32>> = subscription.drain();
//! assert_eq!(seen, vec![vec![], vec![1], vec![1, 2]]);
//! ```

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// A feed that distributes committed states to subscribers.
///
/// The feed:
/// - Emits only committed states
/// - Preserves commit order (the owning container emits under its write lock)
/// - Supports multiple subscribers
/// - Is thread-safe and never blocks the emitter
pub struct UpdateFeed<E> {
    /// Subscribers (senders).
    subscribers: RwLock<Vec<Subscriber<E>>>,
    /// Number of events emitted so far.
    emitted: AtomicU64,
}

/// The feed's side of one subscription.
struct Subscriber<E> {
    tx: Sender<E>,
    /// Dead once the [`Subscription`] is dropped.
    alive: Weak<()>,
}

impl<E> Subscriber<E> {
    fn is_alive(&self) -> bool {
        self.alive.strong_count() > 0
    }
}

impl<E: Clone> UpdateFeed<E> {
    /// Creates a new feed with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            emitted: AtomicU64::new(0),
        }
    }

    /// Subscribes to future events only.
    pub fn subscribe(&self) -> Subscription<E> {
        self.register(None)
    }

    /// Subscribes with `initial` queued ahead of every future event.
    pub fn subscribe_with(&self, initial: E) -> Subscription<E> {
        self.register(Some(initial))
    }

    fn register(&self, initial: Option<E>) -> Subscription<E> {
        let (tx, rx) = mpsc::channel();
        if let Some(initial) = initial {
            // The receiver is alive, so this cannot fail
            let _ = tx.send(initial);
        }
        let token = Arc::new(());
        let mut subscribers = self.subscribers.write();
        subscribers.retain(Subscriber::is_alive);
        subscribers.push(Subscriber {
            tx,
            alive: Arc::downgrade(&token),
        });
        Subscription { rx, _token: token }
    }

    /// Emits an event to all subscribers.
    ///
    /// Subscribers whose receiving side has been dropped are removed.
    pub fn emit(&self, event: E) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|sub| sub.is_alive() && sub.tx.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|sub| sub.is_alive())
            .count()
    }

    /// Returns the number of events emitted since creation.
    pub fn emitted_count(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

impl<E: Clone> Default for UpdateFeed<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for UpdateFeed<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateFeed")
            .field("subscribers", &self.subscribers.read().len())
            .field("emitted", &self.emitted.load(Ordering::Relaxed))
            .finish()
    }
}

/// The receiving side of one subscription.
///
/// Dropping it unsubscribes. Iterating blocks until the next event and ends
/// when the owning feed is dropped.
#[derive(Debug)]
pub struct Subscription<E> {
    rx: Receiver<E>,
    _token: Arc<()>,
}

impl<E> Subscription<E> {
    /// Blocks until the next event; `None` once the feed is gone.
    pub fn recv(&self) -> Option<E> {
        self.rx.recv().ok()
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<E> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Returns every event queued right now, oldest first.
    pub fn drain(&self) -> Vec<E> {
        self.rx.try_iter().collect()
    }
}

impl<E> Iterator for Subscription<E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        self.recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn emit_and_receive() {
        let feed = UpdateFeed::new();
        let sub = feed.subscribe();

        feed.emit(vec![1, 2, 3]);

        assert_eq!(sub.recv_timeout(Duration::from_millis(100)), Some(vec![1, 2, 3]));
    }

    #[test]
    fn primed_subscription_sees_initial_first() {
        let feed = UpdateFeed::new();
        feed.emit("before");

        let sub = feed.subscribe_with("snapshot");
        feed.emit("after");

        assert_eq!(sub.drain(), vec!["snapshot", "after"]);
    }

    #[test]
    fn multiple_subscribers() {
        let feed = UpdateFeed::new();
        let sub1 = feed.subscribe();
        let sub2 = feed.subscribe();

        feed.emit(7);

        assert_eq!(sub1.recv(), Some(7));
        assert_eq!(sub2.recv(), Some(7));
    }

    #[test]
    fn subscriber_cleanup() {
        let feed = UpdateFeed::new();
        assert_eq!(feed.subscriber_count(), 0);

        let sub = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(sub);
        assert_eq!(feed.subscriber_count(), 0);

        // Emit - should clean up disconnected subscriber
        feed.emit(());
        assert_eq!(feed.subscribers.read().len(), 0);
        assert_eq!(feed.emitted_count(), 1);
    }

    #[test]
    fn resubscribing_without_emits_does_not_grow() {
        let feed: UpdateFeed<u8> = UpdateFeed::new();
        for _ in 0..50 {
            drop(feed.subscribe_with(0));
        }
        let kept = feed.subscribe_with(0);

        assert_eq!(feed.subscribers.read().len(), 1);
        assert_eq!(feed.subscriber_count(), 1);
        assert_eq!(feed.emitted_count(), 0);
        drop(kept);
    }

    #[test]
    fn order_is_preserved() {
        let feed = UpdateFeed::new();
        let sub = feed.subscribe();
        for i in 0..100 {
            feed.emit(i);
        }
        assert_eq!(sub.drain(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn iteration_ends_when_feed_dropped() {
        let feed = UpdateFeed::new();
        let sub = feed.subscribe_with(1);
        feed.emit(2);
        drop(feed);

        assert_eq!(sub.collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn threaded_subscribe() {
        let feed = Arc::new(UpdateFeed::new());
        let sub = feed.subscribe();

        let feed_clone = Arc::clone(&feed);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            feed_clone.emit(42);
        });

        assert_eq!(sub.recv_timeout(Duration::from_millis(500)), Some(42));
        handle.join().unwrap();
    }
}
