//! Stress tests for KeyStash.
//!
//! These helpers drive one store from many threads and report what
//! happened, so tests can assert that nothing was lost or torn.

use keystash_core::{KeyValueStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Violations of an expected invariant (lost update, torn read, ...).
    pub violations: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, violations: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            violations,
            duration,
            ops_per_second,
        }
    }

    /// Returns true if every operation succeeded and no invariant broke.
    pub fn is_clean(&self) -> bool {
        self.failed_ops == 0 && self.violations == 0
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct keys (for multi-key tests).
    pub keys: usize,
    /// Size of each payload string in bytes.
    pub payload_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 250,
            threads: 4,
            keys: 8,
            payload_size: 64,
        }
    }
}

/// A list element tagged with its writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tagged {
    /// Writing thread.
    pub worker: usize,
    /// Sequence number within the thread.
    pub seq: usize,
    /// Filler.
    pub payload: String,
}

#[derive(Default)]
struct Counters {
    successful: AtomicUsize,
    failed: AtomicUsize,
    violations: AtomicUsize,
}

impl Counters {
    fn record<T>(&self, result: &StoreResult<T>) {
        match result {
            Ok(_) => self.successful.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn violation(&self) {
        self.violations.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self, duration: Duration) -> StressResult {
        StressResult::new(
            self.successful.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.violations.load(Ordering::Relaxed),
            duration,
        )
    }
}

/// Appends from every thread to one list, then checks that every append
/// landed exactly once and each thread's entries kept their order.
pub fn stress_concurrent_appends(
    store: &KeyValueStore,
    key: &str,
    config: &StressConfig,
) -> StoreResult<StressResult> {
    let list = store.list::<Tagged>(key)?;
    list.clear()?;
    let counters = Arc::new(Counters::default());
    let payload = "x".repeat(config.payload_size);

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|worker| {
            let list = list.clone();
            let counters = Arc::clone(&counters);
            let payload = payload.clone();
            let operations = config.operations;
            thread::spawn(move || {
                for seq in 0..operations {
                    let result = list.append(Tagged {
                        worker,
                        seq,
                        payload: payload.clone(),
                    });
                    counters.record(&result);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    let duration = start.elapsed();

    let items = list.get()?;
    if items.len() != config.threads * config.operations {
        counters.violation();
    }
    for worker in 0..config.threads {
        let seqs: Vec<usize> = items
            .iter()
            .filter(|item| item.worker == worker)
            .map(|item| item.seq)
            .collect();
        if seqs != (0..config.operations).collect::<Vec<_>>() {
            counters.violation();
        }
    }

    Ok(counters.finish(duration))
}

/// Writers put to several value keys while readers read them; every read
/// must decode to a complete value some writer produced.
pub fn stress_value_readers_and_writers(
    store: &KeyValueStore,
    config: &StressConfig,
) -> StoreResult<StressResult> {
    let values = (0..config.keys)
        .map(|k| store.value::<Vec<usize>>(&format!("value_{k}")))
        .collect::<StoreResult<Vec<_>>>()?;
    let values = Arc::new(values);
    let counters = Arc::new(Counters::default());
    let width = config.payload_size.max(1);

    let start = Instant::now();
    let mut handles = Vec::new();
    for worker in 0..config.threads {
        let values = Arc::clone(&values);
        let counters = Arc::clone(&counters);
        let operations = config.operations;
        let writer = worker % 2 == 0;

        handles.push(thread::spawn(move || {
            for i in 0..operations {
                let value = &values[(worker + i) % values.len()];
                if writer {
                    // Every element equals the first, so a torn value is detectable
                    counters.record(&value.put(vec![worker * operations + i; width]));
                } else {
                    let result = value.get();
                    if let Ok(Some(read)) = &result {
                        if read.len() != width || read.iter().any(|v| *v != read[0]) {
                            counters.violation();
                        }
                    }
                    counters.record(&result);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    Ok(counters.finish(start.elapsed()))
}

/// Submits every append through the detached path and checks the outcome
/// like [`stress_concurrent_appends`].
pub fn stress_detached_appends(
    store: &KeyValueStore,
    key: &str,
    config: &StressConfig,
) -> StoreResult<StressResult> {
    let list = store.list::<usize>(key)?;
    list.clear()?;
    let counters = Counters::default();
    let total = config.threads * config.operations;

    let start = Instant::now();
    let pending: Vec<_> = (0..total).map(|i| list.append_detached(i)).collect();
    for handle in pending {
        counters.record(&handle.wait());
    }
    let duration = start.elapsed();

    let mut items = list.get()?;
    items.sort_unstable();
    if items != (0..total).collect::<Vec<_>>() {
        counters.violation();
    }

    Ok(counters.finish(duration))
}
