//! Store configuration and defaults

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`DiskStore`](crate::DiskStore)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskStoreConfig {
    /// Storage root directory, created if absent
    pub path: PathBuf,
    /// Default time-to-live applied when `set` omits one; `None` means
    /// entries never expire
    pub ttl: Option<Duration>,
    /// Compress every document and blob independently to save disk space
    pub zip: bool,
    /// Shard entries into subdirectories keyed by a digest prefix to bound
    /// per-directory file counts
    pub subdirs: bool,
    /// Lock acquisition timing
    pub lock: LockConfig,
}

impl Default for DiskStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./cache"),
            ttl: None,
            zip: false,
            subdirs: true,
            lock: LockConfig::default(),
        }
    }
}

/// Timing knobs for the file lock manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Total time to poll for a free lock within one attempt
    pub wait: Duration,
    /// Interval between polls
    pub poll_period: Duration,
    /// Age after which a lock marker is presumed abandoned by a crashed
    /// holder and safe to clear
    pub stale: Duration,
    /// Additional attempts after the first wait window is exhausted
    pub retries: u32,
    /// Pause between attempts
    pub retry_wait: Duration,
}

impl Default for LockConfig {
    // check the lock at 0ms 50ms 100ms ... 400ms, 1000ms 1050ms ... and so
    // on per retry; markers older than 10s are assumed staled
    fn default() -> Self {
        Self {
            wait: Duration::from_millis(400),
            poll_period: Duration::from_millis(50),
            stale: Duration::from_secs(10),
            retries: 10,
            retry_wait: Duration::from_millis(600),
        }
    }
}

/// Builder for store configurations
#[derive(Debug, Default)]
pub struct DiskStoreConfigBuilder {
    config: DiskStoreConfig,
}

impl DiskStoreConfigBuilder {
    /// Create a builder seeded with the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage root directory
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the default time-to-live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = Some(ttl);
        self
    }

    /// Enable or disable compression
    pub fn with_zip(mut self, zip: bool) -> Self {
        self.config.zip = zip;
        self
    }

    /// Enable or disable sharded subdirectories
    pub fn with_subdirs(mut self, subdirs: bool) -> Self {
        self.config.subdirs = subdirs;
        self
    }

    /// Override the lock timing
    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.config.lock = lock;
        self
    }

    /// Finish the build
    pub fn build(self) -> DiskStoreConfig {
        self.config
    }
}
