//! Store configuration.

use std::time::Duration;

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync artifacts and the directory on every commit
    /// (safer but slower).
    pub sync_writes: bool,

    /// How long to wait for a key's lock before failing (`None` = wait forever).
    pub lock_timeout: Option<Duration>,

    /// Whether to hold an exclusive advisory lock on the store directory.
    pub lock_directory: bool,

    /// Number of worker threads serving detached operations.
    pub background_threads: usize,

    /// Whether the JSON converter indents its output.
    pub pretty_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_writes: true,
            lock_timeout: None,
            lock_directory: true,
            background_threads: 2,
            pretty_json: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync on every commit.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Sets the per-key lock acquisition timeout.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets whether to lock the store directory against other processes.
    #[must_use]
    pub const fn lock_directory(mut self, value: bool) -> Self {
        self.lock_directory = value;
        self
    }

    /// Sets the number of background worker threads (at least one is used).
    #[must_use]
    pub const fn background_threads(mut self, count: usize) -> Self {
        self.background_threads = count;
        self
    }

    /// Sets whether JSON output is indented.
    #[must_use]
    pub const fn pretty_json(mut self, value: bool) -> Self {
        self.pretty_json = value;
        self
    }
}
