//! Entry removal

use super::DiskStore;
use crate::errors::{CacheError, RecoveryHint, Result};
use crate::paths;
use std::path::Path;
use tokio::fs;

impl DiskStore {
    /// Remove the entry for a key
    ///
    /// Deleting a key that was never set is a no-op, whether the shard
    /// directory is missing or just the files.
    pub async fn del(&self, key: &str) -> Result<()> {
        let base = self.entry_base(key);
        if self.missing_shard_dir(&base).await? {
            // no shard directory, nothing to delete
            return Ok(());
        }

        self.with_entry_lock(&base, || self.remove_entry(&base))
            .await
    }

    /// Delete the entry files at a base path; caller holds the lock
    async fn remove_entry(&self, base: &Path) -> Result<()> {
        let zip = self.config().zip;
        let document = paths::document_path(base, zip);
        match fs::remove_file(&document).await {
            Ok(()) => {}
            // nothing stored here; blob files cannot exist without their
            // document outside of a write in progress
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(CacheError::Io {
                    path: document,
                    operation: "remove cache document",
                    source: e,
                    recovery_hint: RecoveryHint::CheckPermissions {
                        path: paths::document_path(base, zip),
                    },
                });
            }
        }

        // blob indices are contiguous from 0; the first absent index ends
        // the scan
        for index in 0u64.. {
            let blob = paths::blob_path(base, index, zip);
            match fs::remove_file(&blob).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
                Err(e) => {
                    return Err(CacheError::Io {
                        path: blob,
                        operation: "remove external blob",
                        source: e,
                        recovery_hint: RecoveryHint::CheckPermissions {
                            path: paths::blob_path(base, index, zip),
                        },
                    });
                }
            }
        }

        tracing::debug!("removed cache entry at {}", base.display());
        Ok(())
    }
}
