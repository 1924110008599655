//! Detached execution of container operations.
//!
//! Callers that do not want to block on a commit can hand the operation to
//! a [`BackgroundExecutor`] and keep a [`Pending`] handle. The operation
//! runs with exactly the same locking and notification behaviour as the
//! direct call; only the calling thread is freed.

use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed pool of worker threads fed through a channel.
///
/// Jobs are started in submission order. With more than one worker, jobs
/// for the same key may still finish in any order; their commits are
/// serialized by the key's lock.
///
/// Dropping the executor stops accepting work; queued jobs still run and
/// the workers exit once the queue is empty.
pub struct BackgroundExecutor {
    sender: Mutex<Option<Sender<Job>>>,
    queued: Arc<AtomicUsize>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundExecutor {
    /// Starts an executor with `threads` workers (at least one).
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn new(threads: usize) -> StoreResult<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let queued = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::new();
        for index in 0..threads.max(1) {
            let receiver = Arc::clone(&receiver);
            let queued = Arc::clone(&queued);
            let worker = thread::Builder::new()
                .name(format!("keystash-bg-{index}"))
                .spawn(move || worker_loop(&receiver, &queued))?;
            workers.push(worker);
        }
        debug!(threads = workers.len(), "background executor started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            queued,
            workers: Mutex::new(workers),
        })
    }

    /// Queues `op` and returns a handle to its eventual result.
    ///
    /// If the executor is shut down the handle resolves immediately to
    /// [`StoreError::ExecutorShutDown`].
    pub fn submit<R, F>(&self, op: F) -> Pending<R>
    where
        R: Send + 'static,
        F: FnOnce() -> StoreResult<R> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            let result = op();
            if let Err(err) = &result {
                warn!(error = %err, "detached operation failed");
            }
            // The caller may have dropped its handle; that is fine
            let _ = tx.send(result);
        });

        let sender = self.sender.lock();
        let accepted = match sender.as_ref() {
            Some(sender) => {
                self.queued.fetch_add(1, Ordering::SeqCst);
                if sender.send(job).is_ok() {
                    true
                } else {
                    self.queued.fetch_sub(1, Ordering::SeqCst);
                    false
                }
            }
            None => false,
        };

        if accepted {
            Pending { rx, early: None }
        } else {
            Pending {
                rx,
                early: Some(StoreError::ExecutorShutDown),
            }
        }
    }

    /// Returns the number of jobs submitted but not yet finished.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Stops accepting work and waits for queued jobs to finish.
    ///
    /// Must not be called from inside a detached operation.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                warn!("background worker exited by panic");
            }
        }
    }
}

impl std::fmt::Debug for BackgroundExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundExecutor")
            .field("workers", &self.workers.lock().len())
            .field("queued", &self.queued())
            .finish()
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>, queued: &AtomicUsize) {
    loop {
        let job = receiver.lock().recv();
        let Ok(job) = job else {
            break;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("detached operation panicked");
        }
        queued.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to the result of a detached operation.
///
/// Dropping the handle does not cancel the operation.
#[derive(Debug)]
pub struct Pending<R> {
    rx: Receiver<StoreResult<R>>,
    early: Option<StoreError>,
}

impl<R> Pending<R> {
    /// Blocks until the operation finishes and returns its result.
    ///
    /// # Errors
    ///
    /// Returns the operation's error, [`StoreError::ExecutorShutDown`] if
    /// it was never queued, or [`StoreError::TaskPanicked`] if it panicked.
    pub fn wait(self) -> StoreResult<R> {
        if let Some(err) = self.early {
            return Err(err);
        }
        self.rx.recv().unwrap_or(Err(StoreError::TaskPanicked))
    }

    /// Waits up to `timeout`; returns `None` if the operation is still running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<StoreResult<R>> {
        if let Some(err) = self.early.take() {
            return Some(Err(err));
        }
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(StoreError::TaskPanicked)),
        }
    }

    /// Returns the result if the operation has already finished.
    pub fn try_wait(&mut self) -> Option<StoreResult<R>> {
        if let Some(err) = self.early.take() {
            return Some(Err(err));
        }
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(StoreError::TaskPanicked)),
        }
    }
}
