//! Read path: `get` and `ttl`

use super::{now_millis, DiskStore, Ttl};
use crate::errors::{CacheError, RecoveryHint, Result};
use crate::paths;
use crate::serialization::{self, CacheEntry};
use crate::value::Value;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

impl DiskStore {
    /// Fetch the value stored under a key
    ///
    /// `None` is a miss: the key was never set, its entry expired, or the
    /// digest collides with a different key. A document that exists but
    /// cannot be read back is an error, never a miss.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_entry(key).await?.map(|entry| entry.value))
    }

    /// Remaining time-to-live for a key
    pub async fn ttl(&self, key: &str) -> Result<Ttl> {
        match self.read_entry(key).await? {
            Some(entry) => Ok(match entry.expire_time {
                None => Ttl::Forever,
                Some(at) => Ttl::Remaining(Duration::from_millis(at.saturating_sub(now_millis()))),
            }),
            None => Ok(Ttl::Missing),
        }
    }

    /// Read and validate the entry for a key
    ///
    /// Expiry is checked first, collision second; both are independent
    /// guards. An expired entry is dropped through a spawned best-effort
    /// delete once the lock is no longer held.
    async fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let base = self.entry_base(key);
        if self.missing_shard_dir(&base).await? {
            tracing::debug!("cache miss, no shard directory for {}", base.display());
            return Ok(None);
        }
        let entry = match self
            .with_entry_lock(&base, || self.load_entry(&base))
            .await?
        {
            Some(entry) => entry,
            None => {
                tracing::debug!("cache miss, no document at {}", base.display());
                return Ok(None);
            }
        };

        if entry.expire_time.is_some_and(|at| at <= now_millis()) {
            tracing::debug!("cache miss, entry at {} expired", base.display());
            let store = self.clone();
            let key = key.to_string();
            tokio::spawn(async move {
                if let Err(err) = store.del(&key).await {
                    tracing::warn!("failed to drop expired entry: {err}");
                }
            });
            return Ok(None);
        }

        if entry.key != key {
            // digest collision: this file belongs to another key and stays
            tracing::debug!("cache miss, key collision at {}", base.display());
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Load and decode the entry files at a base path; caller holds the lock
    async fn load_entry(&self, base: &Path) -> Result<Option<CacheEntry>> {
        let zip = self.config().zip;
        let path = paths::document_path(base, zip);
        let primary = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::Io {
                    path,
                    operation: "read cache document",
                    source: e,
                    recovery_hint: RecoveryHint::Retry {
                        after: Duration::from_millis(100),
                    },
                });
            }
        };

        let entry = serialization::decode(&primary, zip, |index| {
            let path = paths::blob_path(base, index, zip);
            async move {
                match fs::read(&path).await {
                    Ok(bytes) => Ok(bytes),
                    // a referenced blob that is gone means the entry is
                    // inconsistent, not that the key is absent
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Err(CacheError::Corruption {
                            reason: format!(
                                "document references missing blob {}",
                                path.display()
                            ),
                            recovery_hint: RecoveryHint::ClearAndRetry,
                        })
                    }
                    Err(e) => Err(CacheError::Io {
                        path,
                        operation: "read external blob",
                        source: e,
                        recovery_hint: RecoveryHint::Retry {
                            after: Duration::from_millis(100),
                        },
                    }),
                }
            }
        })
        .await?;
        Ok(Some(entry))
    }
}
