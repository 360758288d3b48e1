//! Write-ahead log writer.

use crate::engine::iterator::WalRecordIterator;
use crate::engine::record::WalRecord;
use crate::error::CoreResult;
use logpull_storage::{StorageBackend, StorageResult};
use parking_lot::Mutex;

/// Appends transaction batches to a storage backend.
pub struct WalManager {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl WalManager {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Writes `records` as one contiguous append and makes it durable.
    ///
    /// Returns the offset of the batch. If the append, flush or sync fails,
    /// the backend is truncated back to where the batch started so a later
    /// batch does not land behind a torn one.
    ///
    /// # Errors
    ///
    /// Returns the encoding or storage error that stopped the batch.
    pub fn append_batch(&self, records: &[WalRecord]) -> CoreResult<u64> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&record.encode()?);
        }

        let mut backend = self.backend.lock();
        let start = backend.size()?;
        match write_durably(&mut **backend, &data, self.sync_on_commit) {
            Ok(offset) => Ok(offset),
            Err(e) => {
                if let Err(rollback) = backend.truncate(start) {
                    tracing::error!(
                        offset = start,
                        error = %rollback,
                        "failed to roll back torn WAL batch"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Current log size in bytes.
    ///
    /// # Errors
    ///
    /// Fails if the backend size cannot be read.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Cuts the log back to `offset`, dropping an unreadable tail.
    ///
    /// # Errors
    ///
    /// Fails if the backend refuses the truncation.
    pub fn truncate(&self, offset: u64) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.truncate(offset)?;
        backend.sync()?;
        Ok(())
    }

    /// Feeds every readable record to `visit`, in log order.
    ///
    /// Returns the offset just past the last complete record.
    ///
    /// # Errors
    ///
    /// Propagates corruption errors and errors returned by `visit`.
    pub fn replay<F>(&self, mut visit: F) -> CoreResult<u64>
    where
        F: FnMut(u64, WalRecord) -> CoreResult<()>,
    {
        let backend = self.backend.lock();
        let mut iter = WalRecordIterator::new(&**backend, 0)?;
        for item in iter.by_ref() {
            let (offset, record) = item?;
            visit(offset, record)?;
        }
        Ok(iter.offset())
    }
}

fn write_durably(
    backend: &mut dyn StorageBackend,
    data: &[u8],
    sync: bool,
) -> StorageResult<u64> {
    let offset = backend.append(data)?;
    backend.flush()?;
    if sync {
        backend.sync()?;
    }
    Ok(offset)
}

impl std::fmt::Debug for WalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalManager")
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}
