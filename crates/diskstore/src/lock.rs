//! Advisory cross-process file locks
//!
//! A lock is a marker file created exclusively next to the entry files it
//! guards (`<base>.lock`). Acquisition polls for the marker to disappear
//! within a bounded wait window, retries a fixed number of times, and
//! treats markers older than the staleness threshold as abandoned by a
//! crashed holder. The lock only protects cooperating store instances; it
//! is scoped per entry path, so unrelated keys never contend.

use crate::config::LockConfig;
use crate::errors::{CacheError, RecoveryHint, Result};
use crate::paths;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::fs;

/// Handle for a held lock, owned by the operation that acquired it
#[derive(Debug)]
pub struct LockHandle {
    lock_path: PathBuf,
}

/// Acquires and releases per-path lock markers
#[derive(Debug, Clone)]
pub struct LockManager {
    config: LockConfig,
}

impl LockManager {
    pub fn new(config: LockConfig) -> Self {
        Self { config }
    }

    /// Acquire the lock for an entry base path
    ///
    /// Polls every `poll_period` within each `wait` window, sleeping
    /// `retry_wait` between windows, for up to `retries` extra attempts.
    /// Fails with [`CacheError::LockTimeout`] once every attempt is spent.
    pub async fn acquire(&self, base: &Path) -> Result<LockHandle> {
        let lock_path = paths::lock_path(base);
        let started = Instant::now();

        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_wait).await;
            }
            let window = Instant::now();
            loop {
                match fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&lock_path)
                    .await
                {
                    Ok(_) => return Ok(LockHandle { lock_path }),
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                    Err(e) => {
                        return Err(CacheError::Io {
                            path: lock_path.clone(),
                            operation: "create lock marker",
                            source: e,
                            recovery_hint: RecoveryHint::CheckPermissions { path: lock_path },
                        });
                    }
                }
                if self.clear_if_stale(&lock_path).await? {
                    continue;
                }
                if window.elapsed() >= self.config.wait {
                    break;
                }
                tokio::time::sleep(self.config.poll_period).await;
            }
        }

        Err(CacheError::LockTimeout {
            path: lock_path,
            waited: started.elapsed(),
            attempts: self.config.retries + 1,
            recovery_hint: RecoveryHint::Retry {
                after: self.config.retry_wait,
            },
        })
    }

    /// Release a held lock
    ///
    /// A marker that is already gone is fine; someone may have treated it as
    /// stale in the meantime.
    pub async fn release(&self, handle: LockHandle) -> Result<()> {
        remove_marker(&handle.lock_path).await
    }

    /// Best-effort unlock by entry base path
    ///
    /// Used on failure exits that never got a handle, so a stuck marker
    /// cannot wedge this path for every later operation.
    pub async fn release_path(&self, base: &Path) -> Result<()> {
        remove_marker(&paths::lock_path(base)).await
    }

    /// Clear a marker presumed abandoned; true when the caller should retry
    /// immediately
    async fn clear_if_stale(&self, lock_path: &Path) -> Result<bool> {
        let modified = match fs::metadata(lock_path).await {
            Ok(meta) => meta.modified().ok(),
            // the holder released between our create attempt and this check
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                return Err(CacheError::Io {
                    path: lock_path.to_path_buf(),
                    operation: "inspect lock marker",
                    source: e,
                    recovery_hint: RecoveryHint::Retry {
                        after: self.config.poll_period,
                    },
                });
            }
        };
        let Some(modified) = modified else {
            return Ok(false);
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < self.config.stale {
            return Ok(false);
        }

        tracing::warn!(
            "clearing stale lock marker {} (age {age:?})",
            lock_path.display()
        );
        match fs::remove_file(lock_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(CacheError::Io {
                path: lock_path.to_path_buf(),
                operation: "clear stale lock marker",
                source: e,
                recovery_hint: RecoveryHint::Retry {
                    after: self.config.poll_period,
                },
            }),
        }
    }
}

async fn remove_marker(lock_path: &Path) -> Result<()> {
    match fs::remove_file(lock_path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::Io {
            path: lock_path.to_path_buf(),
            operation: "remove lock marker",
            source: e,
            recovery_hint: RecoveryHint::CheckPermissions {
                path: lock_path.to_path_buf(),
            },
        }),
    }
}
