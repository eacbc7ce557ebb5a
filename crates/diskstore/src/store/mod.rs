//! Disk-backed entry store
//!
//! `DiskStore` wires the hasher, path resolver, codec, and lock manager into
//! the operation surface the cache orchestration layer drives: `set`, `get`,
//! `ttl`, `del`, `reset`, the bulk variants, and an advisory `size`. Every
//! mutation of an entry's files happens while holding that entry's lock, and
//! reads take the lock too so they never observe a half-written document.

mod bulk;
mod read;
mod remove;
mod write;

#[cfg(test)]
mod tests;

use crate::cleanup;
use crate::config::DiskStoreConfig;
use crate::errors::{CacheError, RecoveryHint, Result};
use crate::hashing;
use crate::lock::LockManager;
use crate::paths;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Remaining lifetime reported by [`DiskStore::ttl`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Entry never expires
    Forever,
    /// Entry expires after this much time
    Remaining(Duration),
    /// Entry absent, expired, or owned by a colliding key
    Missing,
}

/// Disk-backed key/value store
///
/// Clones share the same storage root and lock configuration; any number of
/// instances, in this process or others, may point at the same root.
#[derive(Debug, Clone)]
pub struct DiskStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
pub(crate) struct StoreInner {
    pub config: DiskStoreConfig,
    pub locks: LockManager,
}

impl DiskStore {
    /// Open a store over the configured root, creating the directory if
    /// absent
    pub fn new(config: DiskStoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.path).map_err(|e| CacheError::Io {
            path: config.path.clone(),
            operation: "create storage root",
            source: e,
            recovery_hint: RecoveryHint::CheckPermissions {
                path: config.path.clone(),
            },
        })?;
        let locks = LockManager::new(config.lock.clone());
        Ok(Self {
            inner: Arc::new(StoreInner { config, locks }),
        })
    }

    /// Open a store over the default configuration rooted at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(DiskStoreConfig {
            path: path.into(),
            ..DiskStoreConfig::default()
        })
    }

    /// Storage root of this store
    pub fn path(&self) -> &Path {
        &self.inner.config.path
    }

    pub(crate) fn config(&self) -> &DiskStoreConfig {
        &self.inner.config
    }

    /// Base path (no format suffix) for a key's entry files
    pub(crate) fn entry_base(&self, key: &str) -> PathBuf {
        paths::entry_base_path(
            &self.inner.config.path,
            &hashing::digest(key),
            self.inner.config.subdirs,
        )
    }

    /// Whether the shard directory for a base path is absent
    ///
    /// With sharding on, a missing shard directory means the key was never
    /// stored: callers can report a miss (or no-op) without ever creating a
    /// lock marker, which could not live in a nonexistent directory anyway.
    pub(crate) async fn missing_shard_dir(&self, base: &Path) -> Result<bool> {
        if !self.inner.config.subdirs {
            return Ok(false);
        }
        let Some(dir) = base.parent() else {
            return Ok(false);
        };
        match tokio::fs::metadata(dir).await {
            Ok(_) => Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(CacheError::Io {
                path: dir.to_path_buf(),
                operation: "inspect shard directory",
                source: e,
                recovery_hint: RecoveryHint::Retry {
                    after: Duration::from_millis(100),
                },
            }),
        }
    }

    /// Run an operation while holding the entry lock for `base`
    ///
    /// The lock is released on every exit path; when acquisition itself
    /// fails the marker is still cleared best-effort so a dead holder cannot
    /// wedge this path for every later operation.
    pub(crate) async fn with_entry_lock<T, F, Fut>(&self, base: &Path, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let lock = match self.inner.locks.acquire(base).await {
            Ok(lock) => lock,
            Err(err) => {
                let _ = self.inner.locks.release_path(base).await;
                return Err(err);
            }
        };
        let result = operation().await;
        let released = self.inner.locks.release(lock).await;
        match (result, released) {
            (Ok(_), Err(release_err)) => Err(release_err),
            (result, _) => result,
        }
    }

    /// Delete every cache-managed file under the root
    ///
    /// Only files and directories under the reserved `diskstore-` prefix are
    /// touched; unrelated files sharing the root survive, and the root
    /// itself is never removed.
    pub async fn reset(&self) -> Result<()> {
        cleanup::purge(&self.inner.config.path).await
    }

    /// Advisory total size in bytes of all cache-managed files
    ///
    /// Best-effort under concurrent mutation; entries written or removed
    /// during the scan may or may not be counted.
    pub async fn size(&self) -> Result<u64> {
        cleanup::scan_size(&self.inner.config.path).await
    }

    /// Listing keys is not supported
    ///
    /// No reverse index from digests to original keys is maintained, so any
    /// listing would be a lossy directory scan. Fails fast instead.
    pub async fn keys(&self) -> Result<Vec<String>> {
        Err(CacheError::UnsupportedOperation {
            operation: "keys",
            reason: "no reverse index from digests to keys is maintained",
            recovery_hint: RecoveryHint::Ignore,
        })
    }
}

/// Milliseconds since the epoch, the clock the `expireTime` field lives in
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
