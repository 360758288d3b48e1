//! Storage errors.

use std::io;
use thiserror::Error;

/// Result alias for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a [`crate::StorageBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The operating system reported a failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read reached past the last appended byte.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Size of the store at the time of the read.
        size: u64,
    },

    /// A truncate asked to grow the store.
    #[error("cannot truncate to {requested} bytes, store holds only {size}")]
    InvalidTruncate {
        /// Requested size.
        requested: u64,
        /// Current size.
        size: u64,
    },
}
