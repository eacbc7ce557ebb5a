//! Key digest computation for file addressing

use sha2::{Digest, Sha256};

/// Map a cache key to its fixed-length lowercase hex digest
///
/// Deterministic across processes; the digest alone decides where an entry
/// lives on disk. Collisions are handled downstream by comparing the stored
/// key, so the digest only needs to be collision-resistant enough for cache
/// addressing.
pub fn digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}
