//! Callback-style boundary adapters
//!
//! Older orchestration layers drive the store through completion callbacks
//! instead of awaiting results. Each adapter here spawns the core future and
//! hands its outcome to the provided callback; the async methods stay the
//! single implementation of every operation.
//!
//! Adapters must be called from within a tokio runtime.

use crate::errors::Result;
use crate::store::{DiskStore, Ttl};
use crate::value::Value;
use std::future::Future;
use std::time::Duration;

fn dispatch<T, F, C>(future: F, callback: C)
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
    C: FnOnce(Result<T>) + Send + 'static,
{
    tokio::spawn(async move { callback(future.await) });
}

impl DiskStore {
    /// Callback form of [`set`](DiskStore::set)
    pub fn set_with_callback(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        callback: impl FnOnce(Result<()>) + Send + 'static,
    ) {
        let store = self.clone();
        let key = key.to_string();
        dispatch(async move { store.set(&key, value, ttl).await }, callback);
    }

    /// Callback form of [`get`](DiskStore::get)
    pub fn get_with_callback(
        &self,
        key: &str,
        callback: impl FnOnce(Result<Option<Value>>) + Send + 'static,
    ) {
        let store = self.clone();
        let key = key.to_string();
        dispatch(async move { store.get(&key).await }, callback);
    }

    /// Callback form of [`ttl`](DiskStore::ttl)
    pub fn ttl_with_callback(
        &self,
        key: &str,
        callback: impl FnOnce(Result<Ttl>) + Send + 'static,
    ) {
        let store = self.clone();
        let key = key.to_string();
        dispatch(async move { store.ttl(&key).await }, callback);
    }

    /// Callback form of [`del`](DiskStore::del)
    pub fn del_with_callback(
        &self,
        key: &str,
        callback: impl FnOnce(Result<()>) + Send + 'static,
    ) {
        let store = self.clone();
        let key = key.to_string();
        dispatch(async move { store.del(&key).await }, callback);
    }

    /// Callback form of [`reset`](DiskStore::reset)
    pub fn reset_with_callback(&self, callback: impl FnOnce(Result<()>) + Send + 'static) {
        let store = self.clone();
        dispatch(async move { store.reset().await }, callback);
    }

    /// Callback form of [`mset`](DiskStore::mset)
    pub fn mset_with_callback(
        &self,
        entries: Vec<(String, Value)>,
        ttl: Option<Duration>,
        callback: impl FnOnce(Result<()>) + Send + 'static,
    ) {
        let store = self.clone();
        dispatch(async move { store.mset(entries, ttl).await }, callback);
    }

    /// Callback form of [`mget`](DiskStore::mget)
    pub fn mget_with_callback(
        &self,
        keys: Vec<String>,
        callback: impl FnOnce(Result<Vec<Option<Value>>>) + Send + 'static,
    ) {
        let store = self.clone();
        dispatch(
            async move {
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                store.mget(&keys).await
            },
            callback,
        );
    }

    /// Callback form of [`keys`](DiskStore::keys); always reports the
    /// unsupported-operation error
    pub fn keys_with_callback(
        &self,
        callback: impl FnOnce(Result<Vec<String>>) + Send + 'static,
    ) {
        let store = self.clone();
        dispatch(async move { store.keys().await }, callback);
    }

    /// Callback form of [`mdel`](DiskStore::mdel)
    pub fn mdel_with_callback(
        &self,
        keys: Vec<String>,
        callback: impl FnOnce(Result<()>) + Send + 'static,
    ) {
        let store = self.clone();
        dispatch(
            async move {
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                store.mdel(&keys).await
            },
            callback,
        );
    }
}
