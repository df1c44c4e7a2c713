//! Error types for the key-value engine.

use std::io;
use strata_storage::StorageError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key is absent, or its newest record is a tombstone.
    #[error("key not found")]
    NotFound,

    /// A record's stored checksum does not match its contents.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record trailer.
        expected: u32,
        /// Checksum recomputed over the record contents.
        actual: u32,
    },

    /// A segment frame is inconsistent with the file that holds it.
    #[error("corrupt segment: {message}")]
    Corrupt {
        /// Description of the inconsistency.
        message: String,
    },

    /// Empty keys are rejected.
    #[error("invalid key: keys must be non-empty")]
    BadKey,

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// Another process holds the store directory lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Creates a corrupt-segment error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}
