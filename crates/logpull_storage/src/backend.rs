//! The backend contract.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// # Invariants
///
/// - `append` writes at the current end and returns that offset
/// - bytes returned by `read_at` are exactly the bytes appended there
/// - after `sync` returns, appended bytes survive process termination
/// - `truncate` only ever shrinks the store
///
/// The engine serializes all calls through its own lock, so implementations
/// only need to be `Send + Sync`, not lock-free.
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully inside the store, or with an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Fails if the underlying write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Fails if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Current size in bytes, which is also the offset of the next append.
    ///
    /// # Errors
    ///
    /// Fails if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Forces data and metadata to stable storage.
    ///
    /// # Errors
    ///
    /// Fails if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Shrinks the store to `new_size` bytes.
    ///
    /// Used to drop a partially written transaction batch.
    ///
    /// # Errors
    ///
    /// Fails if `new_size` is larger than the current size or the
    /// truncation itself fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
