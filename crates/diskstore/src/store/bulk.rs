//! Bulk operation fan-out
//!
//! Each bulk call fans out concurrently to the single-key operations. For
//! `mset` and `mdel` the first failure fails the whole batch; `mget` keeps
//! per-key hits and misses independent of the other keys.

use super::DiskStore;
use crate::errors::Result;
use crate::value::Value;
use futures::future;
use std::time::Duration;

impl DiskStore {
    /// Store several key/value pairs, sharing one optional TTL
    pub async fn mset(&self, entries: Vec<(String, Value)>, ttl: Option<Duration>) -> Result<()> {
        future::try_join_all(entries.into_iter().map(|(key, value)| {
            let store = self.clone();
            async move { store.set(&key, value, ttl).await }
        }))
        .await?;
        Ok(())
    }

    /// Fetch several keys; results align with the input order
    pub async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Value>>> {
        future::try_join_all(keys.iter().map(|key| self.get(key))).await
    }

    /// Delete several keys; absent keys are no-ops as with [`del`](DiskStore::del)
    pub async fn mdel(&self, keys: &[&str]) -> Result<()> {
        future::try_join_all(keys.iter().map(|key| self.del(key))).await?;
        Ok(())
    }
}
