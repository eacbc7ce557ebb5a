//! Write path for store entries

use super::{now_millis, DiskStore};
use crate::errors::{CacheError, RecoveryHint, Result};
use crate::paths;
use crate::serialization::{self, CacheEntry};
use crate::value::Value;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

impl DiskStore {
    /// Store a value under a key, overwriting any existing entry
    ///
    /// A `ttl` of `None` applies the configured default; `Duration::MAX` is
    /// the explicit "never expires" sentinel. Whoever holds the entry lock
    /// last wins; there is no merge.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let base = self.entry_base(key);
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            expire_time: expire_time(ttl.or(self.config().ttl)),
        };

        if self.config().subdirs {
            ensure_shard_dir(&base).await?;
        }

        self.with_entry_lock(&base, || self.write_entry(&base, &entry))
            .await
    }

    /// Serialize and persist an entry at its base path; caller holds the lock
    async fn write_entry(&self, base: &Path, entry: &CacheEntry) -> Result<()> {
        let zip = self.config().zip;
        let (document, blobs) = serialization::encode(entry, zip)?;

        // blobs land first so the document never references files that are
        // not there yet
        futures::future::try_join_all(blobs.iter().enumerate().map(|(index, bytes)| {
            let path = paths::blob_path(base, index as u64, zip);
            async move {
                fs::write(&path, bytes).await.map_err(|e| CacheError::Io {
                    path: path.clone(),
                    operation: "write external blob",
                    source: e,
                    recovery_hint: RecoveryHint::CheckPermissions { path },
                })
            }
        }))
        .await?;

        let path = paths::document_path(base, zip);
        fs::write(&path, &document)
            .await
            .map_err(|e| CacheError::Io {
                path: path.clone(),
                operation: "write cache document",
                source: e,
                recovery_hint: RecoveryHint::CheckPermissions { path: path.clone() },
            })?;

        tracing::debug!(
            "wrote cache entry at {} ({} blobs)",
            path.display(),
            blobs.len()
        );
        Ok(())
    }
}

fn expire_time(ttl: Option<Duration>) -> Option<u64> {
    match ttl {
        None => None,
        Some(ttl) if ttl == Duration::MAX => None,
        Some(ttl) => {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            Some(now_millis().saturating_add(millis))
        }
    }
}

/// Create the shard directory for a base path, tolerating creation races
/// across processes
async fn ensure_shard_dir(base: &Path) -> Result<()> {
    let Some(dir) = base.parent() else {
        return Ok(());
    };
    match fs::create_dir(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(CacheError::Io {
            path: dir.to_path_buf(),
            operation: "create shard directory",
            source: e,
            recovery_hint: RecoveryHint::CheckPermissions {
                path: dir.to_path_buf(),
            },
        }),
    }
}
