//! Ordered, durable bucket store.
//!
//! Every bucket is an ordered map from byte keys to byte values plus a
//! monotonically increasing sequence counter. All buckets live in one
//! write-ahead log; an in-memory index is rebuilt from it on open.
//!
//! ## Transactions
//!
//! - [`Engine::view`] runs a closure against a consistent snapshot. Any
//!   number of views run concurrently.
//! - [`Engine::update`] runs a closure that stages writes. Writers are
//!   serialized; when the closure returns `Ok` the staged changes are
//!   appended to the log as one `Begin .. Commit` batch, made durable, and
//!   only then become visible to views. An `Err` discards them.
//!
//! ## Recovery
//!
//! Only batches closed by a matching `Commit` are applied. A batch cut short
//! by a crash is dropped, and an unreadable tail is truncated so later
//! appends land on a clean boundary.

mod bucket;
mod iterator;
mod record;
mod tx;
mod wal;

pub use bucket::{Bucket, BucketMut, ReadBucket, WriteBucket};
pub use iterator::WalRecordIterator;
pub use record::{WalRecord, WalRecordType};
pub use tx::{ReadTx, WriteTx};
pub use wal::WalManager;

use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;
use logpull_storage::{InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use tx::{ChangeSet, EngineState};

/// Counters describing an open engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of buckets.
    pub buckets: usize,
    /// Size of the log in bytes.
    pub log_size: u64,
    /// Transactions committed since the log was created.
    pub committed_transactions: u64,
}

/// The bucket store.
pub struct Engine {
    wal: WalManager,
    state: RwLock<EngineState>,
    /// Held for the whole of a write transaction; guards the next txid.
    writer: Mutex<TransactionId>,
}

impl Engine {
    /// Opens an engine over `backend`, replaying whatever it already holds.
    ///
    /// # Errors
    ///
    /// Fails on storage errors and on log corruption that is not a torn tail.
    pub fn open(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> CoreResult<Self> {
        let wal = WalManager::new(backend, sync_on_commit);
        let (state, next_txid) = recover(&wal)?;

        tracing::debug!(
            buckets = state.buckets.len(),
            committed = state.committed_txns,
            next_txid = %next_txid,
            "engine recovered"
        );

        Ok(Self {
            wal,
            state: RwLock::new(state),
            writer: Mutex::new(next_txid),
        })
    }

    /// Opens an empty engine that keeps its log in memory.
    ///
    /// # Errors
    ///
    /// Infallible in practice; shares the signature of [`Engine::open`].
    pub fn in_memory() -> CoreResult<Self> {
        Self::open(Box::new(InMemoryBackend::new()), false)
    }

    /// Runs `f` against a consistent snapshot of committed state.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn view<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&ReadTx<'_>) -> CoreResult<T>,
    {
        let state = self.state.read();
        f(&ReadTx::new(&state))
    }

    /// Runs `f` as a write transaction and commits its changes.
    ///
    /// A transaction that changes nothing writes nothing.
    ///
    /// # Errors
    ///
    /// Returns the error from `f` (nothing is written), or the storage
    /// error that prevented the commit (nothing becomes visible).
    pub fn update<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTx<'_>) -> CoreResult<T>,
    {
        let mut next_txid = self.writer.lock();

        let (value, changes) = {
            let state = self.state.read();
            let mut tx = WriteTx::new(&state);
            let value = f(&mut tx)?;
            (value, tx.into_changes())
        };
        if changes.is_empty() {
            return Ok(value);
        }

        let txid = *next_txid;
        *next_txid = txid.next();

        let offset = self.wal.append_batch(&changes.to_records(txid))?;
        self.state.write().apply(changes);
        tracing::trace!(txid = %txid, offset, "committed");
        Ok(value)
    }

    /// Current counters.
    ///
    /// # Errors
    ///
    /// Fails if the log size cannot be read.
    pub fn stats(&self) -> CoreResult<EngineStats> {
        let log_size = self.wal.size()?;
        let state = self.state.read();
        Ok(EngineStats {
            buckets: state.buckets.len(),
            log_size,
            committed_transactions: state.committed_txns,
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("wal", &self.wal)
            .field("buckets", &self.state.read().buckets.len())
            .finish_non_exhaustive()
    }
}

/// Rebuilds state from the log and returns it with the next free txid.
fn recover(wal: &WalManager) -> CoreResult<(EngineState, TransactionId)> {
    let mut state = EngineState::default();
    let mut open: Option<(TransactionId, Vec<WalRecord>)> = None;
    let mut max_txid = 0u64;

    let end = wal.replay(|offset, record| {
        match record {
            WalRecord::Begin { txid } => {
                max_txid = max_txid.max(txid.as_u64());
                if let Some((torn, _)) = open.replace((txid, Vec::new())) {
                    tracing::warn!(txid = %torn, offset, "discarding torn WAL batch");
                }
            }
            WalRecord::Commit { txid } => {
                max_txid = max_txid.max(txid.as_u64());
                match open.take() {
                    Some((begun, body)) if begun == txid => {
                        state.apply(ChangeSet::from_records(body)?);
                    }
                    Some((begun, _)) => {
                        return Err(CoreError::wal_corruption(format!(
                            "commit of {txid} at offset {offset} closes batch {begun}"
                        )));
                    }
                    None => {
                        return Err(CoreError::wal_corruption(format!(
                            "commit of {txid} at offset {offset} without a batch"
                        )));
                    }
                }
            }
            data => match open.as_mut() {
                Some((_, body)) => body.push(data),
                None => {
                    return Err(CoreError::wal_corruption(format!(
                        "{:?} record at offset {offset} outside a batch",
                        data.record_type()
                    )));
                }
            },
        }
        Ok(())
    })?;

    if let Some((txid, body)) = open {
        tracing::warn!(
            txid = %txid,
            records = body.len(),
            "discarding uncommitted WAL batch"
        );
    }

    let size = wal.size()?;
    if end < size {
        tracing::warn!(offset = end, size, "truncating incomplete WAL tail");
        wal.truncate(end)?;
    }

    Ok((state, TransactionId::new(max_txid).next()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use logpull_storage::FileBackend;
    use std::path::Path;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn open_file(path: &Path) -> Engine {
        Engine::open(Box::new(FileBackend::open(path).unwrap()), true).unwrap()
    }

    fn append(engine: &Engine, bucket: &[u8], value: &[u8]) -> u64 {
        engine
            .update(|tx| {
                let mut b = tx.create_bucket_if_not_exists(bucket)?;
                let id = b.next_sequence()?;
                b.put(&id.to_be_bytes(), value.to_vec())?;
                Ok(id)
            })
            .unwrap()
    }

    fn raw_log(records: &[WalRecord]) -> Vec<u8> {
        records.iter().flat_map(|r| r.encode().unwrap()).collect()
    }

    fn put(txid: u64, key: u64) -> Vec<WalRecord> {
        vec![
            WalRecord::Begin {
                txid: TransactionId::new(txid),
            },
            WalRecord::CreateBucket {
                bucket: b"b".to_vec(),
            },
            WalRecord::Sequence {
                bucket: b"b".to_vec(),
                value: key,
            },
            WalRecord::Put {
                bucket: b"b".to_vec(),
                key: key.to_be_bytes().to_vec(),
                value: vec![key as u8],
            },
        ]
    }

    fn commit(txid: u64) -> WalRecord {
        WalRecord::Commit {
            txid: TransactionId::new(txid),
        }
    }

    #[test]
    fn committed_writes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");

        {
            let engine = open_file(&path);
            assert_eq!(append(&engine, b"feeds/a", b"one"), 1);
            assert_eq!(append(&engine, b"feeds/a", b"two"), 2);
            assert_eq!(append(&engine, b"feeds/b", b"three"), 1);
        }

        let engine = open_file(&path);
        engine
            .view(|tx| {
                let a = tx.bucket(b"feeds/a").unwrap();
                assert_eq!(a.sequence(), 2);
                assert_eq!(a.get(&2u64.to_be_bytes()), Some(&b"two"[..]));
                assert_eq!(tx.bucket(b"feeds/b").unwrap().len(), 1);
                Ok(())
            })
            .unwrap();
        assert_eq!(append(&engine, b"feeds/a", b"four"), 3);
        assert_eq!(engine.stats().unwrap().committed_transactions, 4);
    }

    #[test]
    fn failed_closure_writes_nothing() {
        let engine = Engine::in_memory().unwrap();
        let result: CoreResult<()> = engine.update(|tx| {
            let mut b = tx.create_bucket_if_not_exists(b"feeds/a")?;
            b.next_sequence()?;
            Err(CoreError::invalid_argument("nope"))
        });
        assert!(result.is_err());

        let stats = engine.stats().unwrap();
        assert_eq!(stats.log_size, 0);
        assert_eq!(stats.buckets, 0);
        assert_eq!(append(&engine, b"feeds/a", b"x"), 1);
    }

    #[test]
    fn empty_update_writes_nothing() {
        let engine = Engine::in_memory().unwrap();
        engine.update(|_| Ok(())).unwrap();
        assert_eq!(engine.stats().unwrap().log_size, 0);
    }

    #[test]
    fn uncommitted_tail_batch_is_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let mut records = put(1, 1);
        records.push(commit(1));
        records.extend(put(2, 2));
        std::fs::write(&path, raw_log(&records)).unwrap();

        let engine = open_file(&path);
        engine
            .view(|tx| {
                let b = tx.bucket(b"b").unwrap();
                assert_eq!(b.sequence(), 1);
                assert!(b.get(&2u64.to_be_bytes()).is_none());
                Ok(())
            })
            .unwrap();

        // The discarded batch's txid is not reused.
        assert_eq!(append(&engine, b"b", b"x"), 2);
        drop(engine);
        let engine = open_file(&path);
        engine
            .view(|tx| {
                assert_eq!(tx.bucket(b"b").unwrap().get(&2u64.to_be_bytes()), Some(&b"x"[..]));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn torn_batch_followed_by_committed_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let mut records = put(1, 1);
        records.extend(put(2, 2));
        records.push(commit(2));
        std::fs::write(&path, raw_log(&records)).unwrap();

        let engine = open_file(&path);
        engine
            .view(|tx| {
                let b = tx.bucket(b"b").unwrap();
                assert!(b.get(&1u64.to_be_bytes()).is_none());
                assert!(b.get(&2u64.to_be_bytes()).is_some());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn partial_record_tail_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let mut records = put(1, 1);
        records.push(commit(1));
        let mut data = raw_log(&records);
        let committed_len = data.len() as u64;
        data.extend_from_slice(&WalRecord::Begin { txid: TransactionId::new(2) }.encode().unwrap()[..5]);
        std::fs::write(&path, data).unwrap();

        let engine = open_file(&path);
        assert_eq!(engine.stats().unwrap().log_size, committed_len);
        assert_eq!(append(&engine, b"b", b"y"), 2);
        drop(engine);

        let engine = open_file(&path);
        assert_eq!(engine.stats().unwrap().committed_transactions, 2);
    }

    #[test]
    fn damaged_length_in_early_record_refuses_to_open() {
        // Byte 9 stretches the first record past the file end, byte 10
        // pushes it past the payload cap.
        for byte in [9, 10] {
            let dir = tempdir().unwrap();
            let path = dir.path().join("db");
            {
                let engine = open_file(&path);
                for value in [b"one", b"two", b"six"] {
                    append(&engine, b"feeds/a", value);
                }
            }

            let mut data = std::fs::read(&path).unwrap();
            let len = data.len() as u64;
            data[byte] ^= 0x01;
            std::fs::write(&path, &data).unwrap();

            let result = Engine::open(Box::new(FileBackend::open(&path).unwrap()), true);
            assert!(matches!(result, Err(CoreError::WalCorruption { .. })));
            assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
        }
    }

    #[test]
    fn mismatched_commit_is_corruption() {
        let mut records = put(1, 1);
        records.push(commit(9));
        let backend = InMemoryBackend::with_data(raw_log(&records));
        assert!(matches!(
            Engine::open(Box::new(backend), false),
            Err(CoreError::WalCorruption { .. })
        ));
    }

    #[test]
    fn data_outside_batch_is_corruption() {
        let records = put(1, 1);
        let backend = InMemoryBackend::with_data(raw_log(&records[1..]));
        assert!(matches!(
            Engine::open(Box::new(backend), false),
            Err(CoreError::WalCorruption { .. })
        ));
    }

    #[test]
    fn view_sees_a_stable_snapshot() {
        let engine = Arc::new(Engine::in_memory().unwrap());
        append(&engine, b"feeds/a", b"one");

        let writer = engine
            .view(|tx| {
                let before = tx.bucket(b"feeds/a").unwrap().len();
                // The writer blocks on the state lock until this view ends.
                let writer = {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || append(&engine, b"feeds/a", b"two"))
                };
                thread::sleep(std::time::Duration::from_millis(20));
                assert_eq!(tx.bucket(b"feeds/a").unwrap().len(), before);
                Ok(writer)
            })
            .unwrap();

        assert_eq!(writer.join().unwrap(), 2);
        engine
            .view(|tx| {
                let a = tx.bucket(b"feeds/a").unwrap();
                assert_eq!(a.len(), 2);
                assert_eq!(a.get(&2u64.to_be_bytes()), Some(&b"two"[..]));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn concurrent_writers_get_distinct_ids() {
        let engine = Arc::new(Engine::in_memory().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    (0..25)
                        .map(|_| append(&engine, b"feeds/c", b"v"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=200).collect::<Vec<_>>());
    }
}
