//! Error handling for the disk store
//!
//! Structured error types carrying the failing path, the operation that was
//! underway, and a recovery hint for the caller.

mod display;
mod types;

pub use types::*;
