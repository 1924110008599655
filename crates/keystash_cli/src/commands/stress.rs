//! Stress command implementation.
//!
//! Worker threads randomly append entries to one list and remove their own
//! entries again, while the command observes the list. Afterwards the
//! final list and the observed updates are checked against what the
//! workers report.

use keystash_core::{Converter, KeyValueStore, ListContainer, StoreResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Instant;
use tracing::info;

/// One list element written by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Worker that wrote the entry.
    pub worker: usize,
    /// Operation number within the worker.
    pub seq: usize,
}

/// Outcome of a stress run.
#[derive(Debug, Serialize)]
pub struct StressReport {
    /// Number of worker threads.
    pub threads: usize,
    /// Operations per worker.
    pub ops_per_thread: usize,
    /// Successful appends.
    pub appended: usize,
    /// Successful removals.
    pub removed: usize,
    /// Length of the list after the run.
    pub final_len: usize,
    /// Updates seen by the observer, including the initial snapshot.
    pub updates_observed: usize,
    /// Wall-clock time in milliseconds.
    pub elapsed_ms: u128,
    /// Operations per second.
    pub ops_per_sec: f64,
    /// Whether the final state matches the workers' accounting.
    pub consistent: bool,
}

#[derive(Default)]
struct Tally {
    appended: usize,
    removed: usize,
}

/// Runs the stress command.
pub fn run<C: Converter>(
    store: &KeyValueStore<C>,
    key: &str,
    threads: usize,
    ops: usize,
    show_updates: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let list = store.list::<Entry>(key)?;
    list.clear()?;
    let updates = list.observe()?;
    info!(key, threads, ops, "starting stress run");

    let start = Instant::now();
    let workers: Vec<_> = (0..threads)
        .map(|worker| {
            let list = list.clone();
            thread::spawn(move || churn(&list, worker, ops))
        })
        .collect();

    let mut total = Tally::default();
    for worker in workers {
        let tally = worker.join().map_err(|_| "stress worker panicked")??;
        total.appended += tally.appended;
        total.removed += tally.removed;
    }
    let elapsed = start.elapsed();

    let final_list = list.get()?;
    let seen = updates.drain();
    if show_updates {
        for (n, snapshot) in seen.iter().enumerate() {
            println!("update {n}: {} entries", snapshot.len());
        }
    }

    let performed = total.appended + total.removed;
    let consistent = final_list.len() == total.appended - total.removed
        && seen.len() == performed + 1
        && seen.last() == Some(&final_list);

    let report = StressReport {
        threads,
        ops_per_thread: ops,
        appended: total.appended,
        removed: total.removed,
        final_len: final_list.len(),
        updates_observed: seen.len(),
        elapsed_ms: elapsed.as_millis(),
        ops_per_sec: performed as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        consistent,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if consistent {
        Ok(())
    } else {
        Err("stress run lost or duplicated updates".into())
    }
}

fn churn<C: Converter>(
    list: &ListContainer<Entry, C>,
    worker: usize,
    ops: usize,
) -> StoreResult<Tally> {
    let mut rng = rand::thread_rng();
    let mut tally = Tally::default();
    let mut live = 0usize;

    for seq in 0..ops {
        if live == 0 || rng.gen_bool(0.6) {
            list.append(Entry { worker, seq })?;
            live += 1;
            tally.appended += 1;
        } else {
            // Only this worker removes its own entries, so one is present
            list.remove(|entry| entry.worker == worker)?;
            live -= 1;
            tally.removed += 1;
        }
    }
    Ok(tally)
}
