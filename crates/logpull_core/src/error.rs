//! Error types for the feed store and its engine.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification callers use to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; the caller must fix the request.
    InvalidArgument,
    /// The file being registered or the durable engine failed.
    Io,
    /// A stored descriptor could not be decoded.
    CorruptRecord,
    /// The feed or id does not exist.
    NotFound,
}

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input, rejected before storage is touched.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },

    /// I/O error, typically while hashing a registered file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] logpull_storage::StorageError),

    /// A stored descriptor failed to decode.
    #[error("corrupt record {id} in feed {feed}: {message}")]
    CorruptRecord {
        /// Feed being read.
        feed: String,
        /// Key of the bad record.
        id: u64,
        /// Decoder message.
        message: String,
    },

    /// Point lookup missed.
    #[error("record {id} not found in feed {feed}")]
    NotFound {
        /// Feed searched.
        feed: String,
        /// Id searched for.
        id: u64,
    },

    /// The write-ahead log is structurally damaged.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the damage.
        message: String,
    },

    /// A log record failed its CRC check.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// CRC stored in the record.
        expected: u32,
        /// CRC computed over the record.
        actual: u32,
    },

    /// Another process holds the data directory.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The data directory is unusable.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the problem.
        message: String,
    },

    /// A descriptor could not be encoded.
    #[error("encoding failed: {message}")]
    Encoding {
        /// Encoder message.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why it was refused.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a corrupt record error.
    pub fn corrupt_record(feed: &str, id: u64, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            feed: feed.to_string(),
            id,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(feed: &str, id: u64) -> Self {
        Self::NotFound {
            feed: feed.to_string(),
            id,
        }
    }

    /// Classifies this error.
    ///
    /// Everything the engine raises about its own files counts as [`ErrorKind::Io`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::CorruptRecord { .. } => ErrorKind::CorruptRecord,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Io(_)
            | Self::Storage(_)
            | Self::WalCorruption { .. }
            | Self::ChecksumMismatch { .. }
            | Self::StoreLocked
            | Self::InvalidFormat { .. }
            | Self::Encoding { .. }
            | Self::InvalidOperation { .. } => ErrorKind::Io,
        }
    }
}
