//! The three feed operations, independent of HTTP.

use crate::error::{ServerError, ServerResult};
use logpull_core::{FeedStore, FileDescriptor};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Body of an append request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppendRequest {
    /// Absolute path of the file to register.
    pub file_path: String,
}

/// Body of a read response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReadResponse {
    /// Cursor for the following read.
    pub next: u64,
    /// Entries with `Id >= since`, ascending.
    pub files: Vec<FeedFile>,
}

/// One entry of a [`ReadResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeedFile {
    /// Descriptor id.
    pub id: u64,
    /// Base name of the registered path.
    pub file_name: String,
}

impl From<&FileDescriptor> for FeedFile {
    fn from(descriptor: &FileDescriptor) -> Self {
        Self {
            id: descriptor.id,
            file_name: descriptor.file_name().to_string(),
        }
    }
}

/// A file ready to be streamed to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Where the file lives.
    pub path: PathBuf,
    /// Name for `Content-Disposition`.
    pub file_name: String,
    /// Size when the download was resolved.
    pub len: u64,
}

/// Adapts transport requests to [`FeedStore`] calls.
///
/// Cheap to clone; every clone shares one store.
#[derive(Debug, Clone)]
pub struct FeedService {
    store: Arc<FeedStore>,
}

impl FeedService {
    /// Wraps a shared store.
    pub fn new(store: Arc<FeedStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    /// Registers `request.file_path` in `feed`.
    ///
    /// # Errors
    ///
    /// Client error for a missing feed name or a relative path, server error
    /// if the file cannot be hashed or the store fails.
    pub fn append(&self, feed: &str, request: &AppendRequest) -> ServerResult<FileDescriptor> {
        require_feed(feed)?;
        tracing::info!(feed, file = %request.file_path, "adding file");

        self.store
            .append_file_to_feed(feed, &request.file_path)
            .map_err(|e| log_failure("append", feed, e.into()))
    }

    /// Entries of `feed` from `since` (default 0) on.
    ///
    /// # Errors
    ///
    /// Client error for a missing feed or an unparseable `since`.
    pub fn read(&self, feed: &str, since: Option<&str>) -> ServerResult<ReadResponse> {
        require_feed(feed)?;
        let since = match since {
            None | Some("") => 0,
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                tracing::error!(feed, since = raw, error = %e, "could not parse since");
                ServerError::InvalidRequest(format!("since not valid: {raw}"))
            })?,
        };
        tracing::info!(feed, since, "reading feed");

        let result = self
            .store
            .read_feed(feed, since)
            .map_err(|e| log_failure("read", feed, e.into()))?;

        Ok(ReadResponse {
            next: result.next,
            files: result.files.iter().map(FeedFile::from).collect(),
        })
    }

    /// Resolves descriptor `id` of `feed` to a file on disk.
    ///
    /// # Errors
    ///
    /// Client error for an unparseable id; not found if the descriptor does
    /// not exist or its file is gone.
    pub fn download(&self, feed: &str, id: &str) -> ServerResult<Download> {
        require_feed(feed)?;
        let id = id
            .parse::<u64>()
            .map_err(|_| ServerError::InvalidRequest(format!("could not parse id: {id}")))?;

        let descriptor = self
            .store
            .get_by_id(feed, id)
            .map_err(|e| log_failure("download", feed, e.into()))?;

        let path = PathBuf::from(&descriptor.file_path);
        let metadata = std::fs::metadata(&path)
            .map_err(|e| log_failure("download", feed, file_error(&descriptor, e)))?;

        tracing::debug!(feed, id, file = %descriptor.file_path, "serving file");
        Ok(Download {
            file_name: descriptor.file_name().to_string(),
            path,
            len: metadata.len(),
        })
    }
}

fn require_feed(feed: &str) -> ServerResult<()> {
    if feed.is_empty() {
        return Err(ServerError::InvalidRequest("feed not specified".into()));
    }
    Ok(())
}

/// Maps an error opening a registered file; a vanished file is a 404.
pub(crate) fn file_error(descriptor: &FileDescriptor, e: io::Error) -> ServerError {
    if e.kind() == io::ErrorKind::NotFound {
        ServerError::NotFound(format!("file for id {} no longer exists", descriptor.id))
    } else {
        ServerError::Io(e)
    }
}

fn log_failure(operation: &str, feed: &str, error: ServerError) -> ServerError {
    if error.is_server_error() {
        tracing::error!(operation, feed, error = %error, "feed operation failed");
    } else {
        tracing::warn!(operation, feed, error = %error, "feed request rejected");
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use logpull_core::DescriptorRecord;
    use tempfile::tempdir;

    fn service() -> FeedService {
        FeedService::new(Arc::new(FeedStore::in_memory().unwrap()))
    }

    #[test]
    fn json_shapes_are_pascal_case() {
        let response = ReadResponse {
            next: 3,
            files: vec![FeedFile {
                id: 2,
                file_name: "b.log".into(),
            }],
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"Next":3,"Files":[{"Id":2,"FileName":"b.log"}]}"#
        );

        let request: AppendRequest = serde_json::from_str(r#"{"FilePath":"/x/y"}"#).unwrap();
        assert_eq!(request.file_path, "/x/y");
    }

    #[test]
    fn read_defaults_since_and_reports_base_names() {
        let service = service();
        service
            .store()
            .append_record("f", DescriptorRecord::new("/var/log/a.gz", "00"))
            .unwrap();

        for since in [None, Some("")] {
            let response = service.read("f", since).unwrap();
            assert_eq!(response.next, 2);
            assert_eq!(response.files[0].file_name, "a.gz");
        }
        assert!(service.read("f", Some("2")).unwrap().files.is_empty());
    }

    #[test]
    fn bad_parameters_are_client_errors() {
        let service = service();
        assert!(service.read("f", Some("-1")).unwrap_err().is_client_error());
        assert!(service.read("", None).unwrap_err().is_client_error());
        assert!(service.download("f", "x").unwrap_err().is_client_error());

        let relative = AppendRequest {
            file_path: "relative/file".into(),
        };
        assert_eq!(service.append("f", &relative).unwrap_err().status_code(), 400);
    }

    #[test]
    fn download_resolves_and_tracks_vanished_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("report.csv");
        std::fs::write(&file, b"a,b\n").unwrap();

        let service = service();
        let request = AppendRequest {
            file_path: file.to_str().unwrap().to_string(),
        };
        let descriptor = service.append("f", &request).unwrap();

        let download = service.download("f", &descriptor.id.to_string()).unwrap();
        assert_eq!(download.file_name, "report.csv");
        assert_eq!(download.len, 4);

        assert_eq!(service.download("f", "9").unwrap_err().status_code(), 404);
        std::fs::remove_file(&file).unwrap();
        assert_eq!(service.download("f", "1").unwrap_err().status_code(), 404);
    }
}
