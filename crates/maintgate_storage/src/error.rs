//! Error types for maintenance store operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing maintenance flags.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The flag file could not be decoded.
    #[error("flag file corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the flag file lock.
    #[error("flag file locked: another process has exclusive access")]
    Locked,

    /// The store is temporarily unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}
