//! Display implementations for store errors

use super::types::CacheError;
use std::fmt;

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                path,
                operation,
                source,
                ..
            } => write!(
                f,
                "I/O error during {} on '{}': {}",
                operation,
                path.display(),
                source
            ),
            Self::Serialization {
                operation, source, ..
            } => write!(f, "failed to {operation:?} cache document: {source}"),
            Self::Corruption { reason, .. } => {
                write!(f, "cache entry corruption detected: {reason}")
            }
            Self::LockTimeout {
                path,
                waited,
                attempts,
                ..
            } => write!(
                f,
                "could not lock '{}' after {attempts} attempts ({waited:?})",
                path.display()
            ),
            Self::Compression {
                operation, source, ..
            } => write!(f, "failed to {operation}: {source}"),
            Self::Configuration { message, .. } => {
                write!(f, "invalid store configuration: {message}")
            }
            Self::UnsupportedOperation {
                operation, reason, ..
            } => write!(f, "{operation}() is not supported: {reason}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } | Self::Compression { source, .. } => Some(source),
            Self::Serialization { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}
