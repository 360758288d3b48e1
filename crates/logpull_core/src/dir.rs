//! Data directory layout and locking.
//!
//! ```text
//! <data_path>/
//! ├─ LOCK   # advisory lock, one process per directory
//! └─ db     # engine write-ahead log holding every feed
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const DB_FILE: &str = "db";

/// An opened, exclusively locked data directory.
///
/// The lock is released when this value is dropped.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens `path`, creating it first when `create_if_missing` is set.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidFormat`] if the path is missing (and may not be
    ///   created) or is not a directory
    /// - [`CoreError::StoreLocked`] if another handle holds the lock
    /// - I/O errors
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if !create_if_missing {
                return Err(CoreError::invalid_format(format!(
                    "data directory does not exist: {}",
                    path.display()
                )));
            }
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "data path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Root of the data directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the engine log.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.path.join(DB_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_directory() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("data");

        let dir = StoreDir::open(&path, true).unwrap();
        assert!(path.is_dir());
        assert_eq!(dir.db_path(), path.join("db"));
        assert_eq!(dir.path(), path);
    }

    #[test]
    fn missing_directory_without_create_fails() {
        let tmp = tempdir().unwrap();
        let result = StoreDir::open(&tmp.path().join("absent"), false);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn file_instead_of_directory_fails() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("plain");
        fs::write(&path, b"x").unwrap();

        let result = StoreDir::open(&path, true);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn second_open_is_locked_out_until_drop() {
        let tmp = tempdir().unwrap();

        let first = StoreDir::open(tmp.path(), true).unwrap();
        assert!(matches!(
            StoreDir::open(tmp.path(), true),
            Err(CoreError::StoreLocked)
        ));

        drop(first);
        assert!(StoreDir::open(tmp.path(), true).is_ok());
    }
}
