//! Disk-backed key/value cache storage engine
//!
//! Each entry is persisted as a per-key file pair: a JSON document plus
//! optional external binary blobs, addressed by a digest of the key. Entries
//! carry a time-to-live and are guarded by advisory cross-process file
//! locks, so any number of store instances, in this process or others, can
//! share one storage root.
//!
//! This crate is the storage engine only; get-or-compute wrapping,
//! multi-tier composition, and the rest of the orchestration surface belong
//! to the layer above it.
//!
//! ```no_run
//! use diskstore::{DiskStore, Value};
//!
//! # async fn demo() -> diskstore::Result<()> {
//! let store = DiskStore::open("./cache")?;
//! store.set("greeting", Value::from("hello"), None).await?;
//! assert_eq!(store.get("greeting").await?, Some(Value::from("hello")));
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod cleanup;
pub mod config;
pub mod errors;
pub mod hashing;
pub mod lock;
pub mod paths;
pub mod serialization;
pub mod store;
pub mod value;

pub use config::{DiskStoreConfig, DiskStoreConfigBuilder, LockConfig};
pub use errors::{CacheError, RecoveryHint, Result, SerializationOp};
pub use serialization::CacheEntry;
pub use store::{DiskStore, Ttl};
pub use value::{TypedArray, Value};
