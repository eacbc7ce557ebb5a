//! Deflate helpers for compressed documents and blobs
//!
//! The document and every blob are compressed independently as bare deflate
//! streams. Nothing in the files says whether they are compressed; the
//! reader must already know from the store's `zip` setting.

use crate::errors::{CacheError, RecoveryHint, Result};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compress a document or blob before it is written
pub fn deflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .and_then(|()| encoder.finish())
        .map_err(|e| CacheError::Compression {
            operation: "compress cache file",
            source: e,
            recovery_hint: RecoveryHint::Retry {
                after: std::time::Duration::from_millis(100),
            },
        })
}

/// Decompress a document or blob after it is read
pub fn inflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Compression {
            operation: "decompress cache file",
            source: e,
            recovery_hint: RecoveryHint::Manual {
                instructions: "check that the store's zip setting matches the files on disk"
                    .to_string(),
            },
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_inflate_round_trip() {
        let payload = b"some document text that deflates \xf0\x9f\xa6\x80".repeat(20);
        let compressed = deflate(&payload).unwrap();
        assert_ne!(compressed, payload);
        assert_eq!(inflate(&compressed).unwrap(), payload);
    }

    #[test]
    fn inflate_rejects_garbage() {
        assert!(inflate(b"definitely not a deflate stream").is_err());
    }
}
