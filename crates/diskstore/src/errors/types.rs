//! Core error types for the disk store

use std::path::PathBuf;
use std::time::Duration;

/// Result type for disk store operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Error type for disk store operations
///
/// A cache miss is never an error; operations report misses through their
/// return values. Everything here is fatal for the operation that raised it.
#[derive(Debug)]
pub enum CacheError {
    /// I/O errors during store operations
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// Encoding or decoding the on-disk document failed
    Serialization {
        operation: SerializationOp,
        source: Box<dyn std::error::Error + Send + Sync>,
        recovery_hint: RecoveryHint,
    },

    /// Entry files are present but inconsistent or unreadable
    Corruption {
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// The per-path lock could not be acquired within the configured bound
    LockTimeout {
        path: PathBuf,
        waited: Duration,
        attempts: u32,
        recovery_hint: RecoveryHint,
    },

    /// Compression or decompression of a document or blob failed
    Compression {
        operation: &'static str,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// Invalid store configuration
    Configuration {
        message: String,
        recovery_hint: RecoveryHint,
    },

    /// The operation is not supported by this storage engine
    UnsupportedOperation {
        operation: &'static str,
        reason: &'static str,
        recovery_hint: RecoveryHint,
    },
}

/// Serialization direction for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationOp {
    Encode,
    Decode,
}

/// Recovery hints for error handling
#[derive(Debug, Clone)]
pub enum RecoveryHint {
    /// Retry the operation after a delay
    Retry { after: Duration },

    /// Delete the affected entry and retry
    ClearAndRetry,

    /// Check file permissions
    CheckPermissions { path: PathBuf },

    /// No automated recovery possible
    Manual { instructions: String },

    /// Operation can be safely ignored
    Ignore,
}
