//! Read and write transactions.

use crate::engine::bucket::{Bucket, BucketMut, BucketState, PendingBucket};
use crate::engine::record::WalRecord;
use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;
use std::collections::BTreeMap;

/// Every committed bucket, keyed by name.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub(crate) buckets: BTreeMap<Vec<u8>, BucketState>,
    pub(crate) committed_txns: u64,
}

impl EngineState {
    /// Folds a committed change set into the state.
    pub(crate) fn apply(&mut self, changes: ChangeSet) {
        for (name, pending) in changes.buckets {
            let bucket = self.buckets.entry(name).or_default();
            if let Some(sequence) = pending.sequence {
                bucket.sequence = bucket.sequence.max(sequence);
            }
            bucket.entries.extend(pending.puts);
        }
        self.committed_txns += 1;
    }
}

/// A read-only view of committed state.
///
/// The engine holds its state lock shared for the lifetime of the view, so
/// every lookup inside one view sees the same snapshot.
#[derive(Debug)]
pub struct ReadTx<'a> {
    state: &'a EngineState,
}

impl<'a> ReadTx<'a> {
    pub(crate) fn new(state: &'a EngineState) -> Self {
        Self { state }
    }

    /// Opens a bucket, or `None` if it was never created.
    #[must_use]
    pub fn bucket(&self, name: &[u8]) -> Option<Bucket<'a>> {
        self.state
            .buckets
            .get_key_value(name)
            .map(|(name, state)| Bucket::new(name, state))
    }

    /// All buckets whose name starts with `prefix`, in name order.
    pub fn buckets_with_prefix<'p>(
        &self,
        prefix: &'p [u8],
    ) -> impl Iterator<Item = Bucket<'a>> + 'p
    where
        'a: 'p,
    {
        self.state
            .buckets
            .iter()
            .filter(move |(name, _)| name.starts_with(prefix))
            .map(|(name, state)| Bucket::new(name, state))
    }
}

/// A read-write transaction.
///
/// Writes are staged and only reach the log and the shared state when the
/// closure passed to [`crate::engine::Engine::update`] returns `Ok`.
#[derive(Debug)]
pub struct WriteTx<'a> {
    committed: &'a EngineState,
    pending: BTreeMap<Vec<u8>, PendingBucket>,
}

impl<'a> WriteTx<'a> {
    pub(crate) fn new(committed: &'a EngineState) -> Self {
        Self {
            committed,
            pending: BTreeMap::new(),
        }
    }

    /// Opens `name` for writing, staging its creation if it does not exist.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidArgument`] for an empty name.
    pub fn create_bucket_if_not_exists(&mut self, name: &[u8]) -> CoreResult<BucketMut<'_>> {
        if name.is_empty() {
            return Err(CoreError::invalid_argument("bucket name must not be empty"));
        }

        let committed = self.committed.buckets.get(name);
        let pending = self
            .pending
            .entry(name.to_vec())
            .or_insert_with(|| PendingBucket {
                created: committed.is_none(),
                ..PendingBucket::default()
            });
        Ok(BucketMut::new(committed, pending))
    }

    /// Opens an existing bucket for writing.
    pub fn bucket(&mut self, name: &[u8]) -> Option<BucketMut<'_>> {
        let committed = self.committed.buckets.get(name);
        if committed.is_none() && !self.pending.contains_key(name) {
            return None;
        }

        let pending = self.pending.entry(name.to_vec()).or_default();
        Some(BucketMut::new(committed, pending))
    }

    pub(crate) fn into_changes(self) -> ChangeSet {
        ChangeSet {
            buckets: self
                .pending
                .into_iter()
                .filter(|(_, p)| !p.is_noop())
                .collect(),
        }
    }
}

/// The effective changes of one write transaction.
#[derive(Debug, Default)]
pub(crate) struct ChangeSet {
    buckets: BTreeMap<Vec<u8>, PendingBucket>,
}

impl ChangeSet {
    pub(crate) fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Log records for this change set, framed by `Begin` and `Commit`.
    pub(crate) fn to_records(&self, txid: TransactionId) -> Vec<WalRecord> {
        let mut records = vec![WalRecord::Begin { txid }];
        for (name, pending) in &self.buckets {
            if pending.created {
                records.push(WalRecord::CreateBucket {
                    bucket: name.clone(),
                });
            }
            if let Some(value) = pending.sequence {
                records.push(WalRecord::Sequence {
                    bucket: name.clone(),
                    value,
                });
            }
            for (key, value) in &pending.puts {
                records.push(WalRecord::Put {
                    bucket: name.clone(),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        records.push(WalRecord::Commit { txid });
        records
    }

    /// Rebuilds a change set from the data records of one logged batch.
    pub(crate) fn from_records(records: Vec<WalRecord>) -> CoreResult<Self> {
        let mut changes = Self::default();
        for record in records {
            match record {
                WalRecord::CreateBucket { bucket } => {
                    changes.buckets.entry(bucket).or_default().created = true;
                }
                WalRecord::Sequence { bucket, value } => {
                    changes.buckets.entry(bucket).or_default().sequence = Some(value);
                }
                WalRecord::Put { bucket, key, value } => {
                    changes
                        .buckets
                        .entry(bucket)
                        .or_default()
                        .puts
                        .insert(key, value);
                }
                WalRecord::Begin { .. } | WalRecord::Commit { .. } => {
                    return Err(CoreError::wal_corruption(
                        "transaction marker inside a batch body",
                    ));
                }
            }
        }
        Ok(changes)
    }
}
