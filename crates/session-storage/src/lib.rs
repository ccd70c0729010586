//! Persistent key-value storage for the OIDC JWT session engine.
//!
//! Backends:
//! - **memory**: in-process map with optional quota (tests, embedding)
//! - **noop**: for contexts without durable storage
//! - **file**: a JSON object on disk (CLI)
//!
//! [`SessionStore`] layers typed, JSON-encoded access to the four
//! persisted session keys over any backend.

mod file;
mod keys;
mod memory;
mod noop;
mod session_store;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use noop::NoopStorage;
pub use session_store::SessionStore;
pub use traits::KeyValueStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend is full
    #[error("Storage full for key \"{key}\" - entries: {entries:?} - size: {size_bytes} bytes")]
    QuotaExceeded {
        key: String,
        entries: Vec<String>,
        size_bytes: usize,
    },

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
