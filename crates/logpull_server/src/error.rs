//! Error types for the feed server.

use logpull_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the feed server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed request: bad JSON, unparseable id or cursor, missing feed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested descriptor or its file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Feed store error.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Certificates or keys could not be loaded.
    #[error("TLS error: {0}")]
    Tls(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status code for this error.
    ///
    /// Store errors keep their kind: a rejected argument is a 400, a missing
    /// feed or id a 404, and everything else a 500.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Store(e) => match e.kind() {
                ErrorKind::InvalidArgument => 400,
                ErrorKind::NotFound => 404,
                ErrorKind::Io | ErrorKind::CorruptRecord => 500,
            },
            Self::Config(_) | Self::Tls(_) | Self::Io(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
        assert_eq!(ServerError::NotFound("gone".into()).status_code(), 404);
    }

    #[test]
    fn store_errors_keep_their_kind() {
        let relative = ServerError::from(CoreError::invalid_argument("relative path"));
        assert_eq!(relative.status_code(), 400);

        let missing = ServerError::from(CoreError::not_found("nightly", 4));
        assert_eq!(missing.status_code(), 404);

        let corrupt = ServerError::from(CoreError::corrupt_record("nightly", 4, "eof"));
        assert_eq!(corrupt.status_code(), 500);

        let io = ServerError::from(CoreError::from(std::io::Error::from(
            std::io::ErrorKind::PermissionDenied,
        )));
        assert!(io.is_server_error());
    }

    #[test]
    fn error_display() {
        let msg = ServerError::Config("server.path not provided".into()).to_string();
        assert!(msg.contains("server.path"));
    }
}
