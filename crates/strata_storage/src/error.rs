//! Error types for storage backends.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read extended past the end of the store.
    #[error("read past end: offset {offset} + len {len} exceeds size {size}")]
    ReadPastEnd {
        /// Requested start offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Current store size.
        size: u64,
    },
}
