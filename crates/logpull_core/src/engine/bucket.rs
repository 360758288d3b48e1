//! Bucket contracts and their engine-backed implementations.

use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Read access to one ordered bucket.
pub trait ReadBucket {
    /// Highest value ever handed out by the bucket's sequence counter.
    fn sequence(&self) -> u64;

    /// Looks up an exact key.
    fn get(&self, key: &[u8]) -> Option<&[u8]>;

    /// Entries with key `>= start`, in ascending key order.
    fn scan_from<'s>(
        &'s self,
        start: &[u8],
    ) -> Box<dyn Iterator<Item = (&'s [u8], &'s [u8])> + 's>;
}

/// Write access to one ordered bucket inside a write transaction.
pub trait WriteBucket {
    /// Current value of the sequence counter, including staged increments.
    fn sequence(&self) -> u64;

    /// Increments the counter and returns the new value.
    ///
    /// Values are unique and gap-free among committed transactions because
    /// writers run one at a time.
    fn next_sequence(&mut self) -> CoreResult<u64>;

    /// Stages `value` under `key`.
    fn put(&mut self, key: &[u8], value: Vec<u8>) -> CoreResult<()>;

    /// Looks up a key, seeing this transaction's own staged writes.
    fn get(&self, key: &[u8]) -> Option<&[u8]>;
}

/// Committed contents of a bucket.
#[derive(Debug, Default, Clone)]
pub(crate) struct BucketState {
    pub(crate) sequence: u64,
    pub(crate) entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// A committed bucket seen through a read transaction.
#[derive(Debug, Clone, Copy)]
pub struct Bucket<'a> {
    name: &'a [u8],
    state: &'a BucketState,
}

impl<'a> Bucket<'a> {
    pub(crate) fn new(name: &'a [u8], state: &'a BucketState) -> Self {
        Self { name, state }
    }

    /// Bucket name.
    #[must_use]
    pub fn name(&self) -> &'a [u8] {
        self.name
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    /// Whether the bucket holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }
}

impl ReadBucket for Bucket<'_> {
    fn sequence(&self) -> u64 {
        self.state.sequence
    }

    fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.state.entries.get(key).map(Vec::as_slice)
    }

    fn scan_from<'s>(
        &'s self,
        start: &[u8],
    ) -> Box<dyn Iterator<Item = (&'s [u8], &'s [u8])> + 's> {
        let range = self
            .state
            .entries
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded));
        Box::new(range.map(|(k, v)| (k.as_slice(), v.as_slice())))
    }
}

/// Changes one write transaction stages against one bucket.
#[derive(Debug, Default)]
pub(crate) struct PendingBucket {
    pub(crate) created: bool,
    pub(crate) sequence: Option<u64>,
    pub(crate) puts: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl PendingBucket {
    pub(crate) fn is_noop(&self) -> bool {
        !self.created && self.sequence.is_none() && self.puts.is_empty()
    }
}

/// A bucket opened for writing.
#[derive(Debug)]
pub struct BucketMut<'t> {
    committed: Option<&'t BucketState>,
    pending: &'t mut PendingBucket,
}

impl<'t> BucketMut<'t> {
    pub(crate) fn new(committed: Option<&'t BucketState>, pending: &'t mut PendingBucket) -> Self {
        Self { committed, pending }
    }
}

impl WriteBucket for BucketMut<'_> {
    fn sequence(&self) -> u64 {
        self.pending
            .sequence
            .or_else(|| self.committed.map(|b| b.sequence))
            .unwrap_or(0)
    }

    fn next_sequence(&mut self) -> CoreResult<u64> {
        let next = self
            .sequence()
            .checked_add(1)
            .ok_or_else(|| CoreError::invalid_operation("bucket sequence exhausted"))?;
        self.pending.sequence = Some(next);
        Ok(next)
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> CoreResult<()> {
        if key.is_empty() {
            return Err(CoreError::invalid_argument("bucket keys must not be empty"));
        }
        self.pending.puts.insert(key.to_vec(), value);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.pending
            .puts
            .get(key)
            .or_else(|| self.committed.and_then(|b| b.entries.get(key)))
            .map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committed() -> BucketState {
        let mut state = BucketState {
            sequence: 3,
            ..BucketState::default()
        };
        for id in 1u64..=3 {
            state.entries.insert(id.to_be_bytes().to_vec(), vec![id as u8]);
        }
        state
    }

    #[test]
    fn scan_from_is_inclusive_and_ordered() {
        let state = committed();
        let bucket = Bucket::new(b"feeds/a", &state);

        let keys: Vec<_> = bucket
            .scan_from(&2u64.to_be_bytes())
            .map(|(_, v)| v[0])
            .collect();
        assert_eq!(keys, vec![2, 3]);
        assert_eq!(bucket.scan_from(&9u64.to_be_bytes()).count(), 0);
        assert_eq!(bucket.scan_from(&0u64.to_be_bytes()).count(), 3);
    }

    #[test]
    fn staged_sequence_builds_on_committed() {
        let state = committed();
        let mut pending = PendingBucket::default();
        let mut bucket = BucketMut::new(Some(&state), &mut pending);

        assert_eq!(bucket.sequence(), 3);
        assert_eq!(bucket.next_sequence().unwrap(), 4);
        assert_eq!(bucket.next_sequence().unwrap(), 5);
        assert_eq!(pending.sequence, Some(5));
    }

    #[test]
    fn staged_put_shadows_committed_value() {
        let state = committed();
        let mut pending = PendingBucket::default();
        let mut bucket = BucketMut::new(Some(&state), &mut pending);

        assert_eq!(bucket.get(&1u64.to_be_bytes()), Some(&[1u8][..]));
        bucket.put(&1u64.to_be_bytes(), vec![9]).unwrap();
        assert_eq!(bucket.get(&1u64.to_be_bytes()), Some(&[9u8][..]));
        assert!(bucket.put(b"", vec![]).is_err());
    }

    #[test]
    fn sequence_overflow_is_refused() {
        let state = BucketState {
            sequence: u64::MAX,
            ..BucketState::default()
        };
        let mut pending = PendingBucket::default();
        let mut bucket = BucketMut::new(Some(&state), &mut pending);
        assert!(matches!(
            bucket.next_sequence(),
            Err(CoreError::InvalidOperation { .. })
        ));
    }
}
