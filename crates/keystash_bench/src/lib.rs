//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A list element with a payload of configurable size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier used by predicates.
    pub id: u64,
    /// Filler text.
    pub body: String,
}

/// Generate random raw bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a random alphanumeric string of the specified length.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate `count` records with ids `0..count` and bodies of `body_size` bytes.
pub fn generate_records(count: usize, body_size: usize) -> Vec<Record> {
    (0..count as u64)
        .map(|id| Record {
            id,
            body: random_text(body_size),
        })
        .collect()
}
