//! Reset and size scanning over the storage tree
//!
//! The walk is bounded to the sharding depth and filters every name against
//! the reserved `diskstore-` path patterns before doing anything, so
//! unrelated files sharing the storage root are never touched.

use crate::errors::{CacheError, RecoveryHint, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;
use tokio::fs;

/// Directory depth covered by the sharding scheme
const MAX_DEPTH: u32 = 2;

lazy_static! {
    static ref CACHE_DIR_RE: Regex =
        Regex::new(r"[/\\]diskstore-[0-9a-fA-F][0-9a-fA-F/\\]*$").unwrap();
    static ref CACHE_FILE_RE: Regex =
        Regex::new(r"[/\\]diskstore-[0-9a-fA-F][0-9a-fA-F/\\]*(\.json|-\d+\.bin)(\.gz)?$").unwrap();
}

/// Delete every cache-managed file under the root
///
/// Shard subdirectories are removed once empty; the root itself never is.
pub async fn purge(root: &Path) -> Result<()> {
    purge_dir(root, MAX_DEPTH).await
}

/// Advisory total size in bytes of all cache-managed files under the root
pub async fn scan_size(root: &Path) -> Result<u64> {
    scan_dir(root, MAX_DEPTH).await
}

fn purge_dir(dir: &Path, depth: u32) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
    Box::pin(async move {
        let mut entries = read_dir(dir).await?;
        while let Some(entry) = next_entry(dir, &mut entries).await? {
            let path = entry.path();
            let text = path.to_string_lossy();
            let file_type = entry.file_type().await.map_err(|e| walk_error(&path, e))?;

            if file_type.is_dir() && CACHE_DIR_RE.is_match(&text) {
                if depth > 0 {
                    purge_dir(&path, depth - 1).await?;
                }
                // gone once empty; a leftover unrelated file keeps it alive
                if let Err(e) = fs::remove_dir(&path).await {
                    tracing::debug!("leaving shard directory {}: {e}", path.display());
                }
            } else if file_type.is_file() && CACHE_FILE_RE.is_match(&text) {
                fs::remove_file(&path).await.map_err(|e| CacheError::Io {
                    path: path.clone(),
                    operation: "remove cache file",
                    source: e,
                    recovery_hint: RecoveryHint::CheckPermissions { path: path.clone() },
                })?;
            }
        }
        Ok(())
    })
}

fn scan_dir(dir: &Path, depth: u32) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
    Box::pin(async move {
        let mut total = 0u64;
        // entries removed mid-scan are fine to skip; the count is advisory
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(walk_error(dir, e)),
        };
        while let Some(entry) = next_entry(dir, &mut entries).await? {
            let path = entry.path();
            let text = path.to_string_lossy();
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };

            if file_type.is_dir() && CACHE_DIR_RE.is_match(&text) {
                if depth > 0 {
                    total += scan_dir(&path, depth - 1).await?;
                }
            } else if file_type.is_file() && CACHE_FILE_RE.is_match(&text) {
                if let Ok(meta) = entry.metadata().await {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    })
}

async fn read_dir(dir: &Path) -> Result<fs::ReadDir> {
    fs::read_dir(dir).await.map_err(|e| walk_error(dir, e))
}

async fn next_entry(dir: &Path, entries: &mut fs::ReadDir) -> Result<Option<fs::DirEntry>> {
    entries.next_entry().await.map_err(|e| walk_error(dir, e))
}

fn walk_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        operation: "walk storage directory",
        source,
        recovery_hint: RecoveryHint::Retry {
            after: Duration::from_millis(100),
        },
    }
}
