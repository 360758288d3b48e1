//! File descriptors and their stored form.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One registered file within one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Position in the feed, assigned by the store. The n-th append gets n.
    pub id: u64,
    /// Absolute path recorded at append time.
    pub file_path: String,
    /// Lowercase hex SHA-256 of the file content at append time.
    pub sha256: String,
}

impl FileDescriptor {
    /// Last segment of [`Self::file_path`], or the whole path if it has none.
    #[must_use]
    pub fn file_name(&self) -> &str {
        Path::new(&self.file_path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.file_path)
    }
}

/// A descriptor before the store has given it an id.
///
/// This is also the stored value: the id lives only in the record key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    /// Absolute path of the file.
    pub file_path: String,
    /// Lowercase hex SHA-256 of the file content.
    pub sha256: String,
}

impl DescriptorRecord {
    /// Creates a record.
    pub fn new(file_path: impl Into<String>, sha256: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            sha256: sha256.into(),
        }
    }

    /// Attaches the id the store assigned.
    #[must_use]
    pub fn with_id(self, id: u64) -> FileDescriptor {
        FileDescriptor {
            id,
            file_path: self.file_path,
            sha256: self.sha256,
        }
    }

    pub(crate) fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf).map_err(|e| CoreError::Encoding {
            message: e.to_string(),
        })?;
        Ok(buf)
    }

    /// Decodes a stored value; the error is the decoder's message.
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, String> {
        ciborium::de::from_reader(bytes).map_err(|e| e.to_string())
    }
}
