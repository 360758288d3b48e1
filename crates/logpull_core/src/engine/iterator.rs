//! Streaming reader over log records.

use crate::engine::record::{
    WalRecord, WalRecordType, CRC_SIZE, HEADER_SIZE, MAX_PAYLOAD_LEN, WAL_MAGIC, WAL_VERSION,
};
use crate::error::{CoreError, CoreResult};
use logpull_storage::StorageBackend;

/// Iterates `(offset, record)` pairs from a backend, one record at a time.
///
/// - An incomplete header or payload at the tail ends iteration cleanly;
///   that is what a crash in the middle of an append leaves behind.
/// - A record that runs past the end but is followed by a complete record
///   is not a tail. It is a damaged length field and yields an error.
/// - Bad magic, an unknown type, a future version, an oversized length or
///   a CRC mismatch yield one error and then stop.
pub struct WalRecordIterator<'a> {
    backend: &'a dyn StorageBackend,
    size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> WalRecordIterator<'a> {
    /// Starts reading at `start_offset`.
    ///
    /// # Errors
    ///
    /// Fails if the backend size cannot be read.
    pub fn new(backend: &'a dyn StorageBackend, start_offset: u64) -> CoreResult<Self> {
        Ok(Self {
            backend,
            size: backend.size()?,
            offset: start_offset,
            finished: false,
        })
    }

    /// Offset just past the last record returned.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, WalRecord)>> {
        let start = self.offset;
        let remaining = self.size.saturating_sub(start);
        if remaining < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;
        if header[0..4] != WAL_MAGIC {
            return Err(CoreError::wal_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > WAL_VERSION {
            return Err(CoreError::wal_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let record_type = WalRecordType::from_byte(header[6]).ok_or_else(|| {
            CoreError::wal_corruption(format!(
                "unknown record type {} at offset {start}",
                header[6]
            ))
        })?;

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(CoreError::wal_corruption(format!(
                "record at offset {start} claims {payload_len} payload bytes"
            )));
        }

        let total_len = HEADER_SIZE + payload_len + CRC_SIZE;
        if remaining < total_len as u64 {
            // `remaining` is below `total_len`, so this read is bounded.
            let rest = self.backend.read_at(start, remaining as usize)?;
            if let Some(next) = find_complete_record(&rest[1..]) {
                return Err(CoreError::wal_corruption(format!(
                    "record at offset {start} claims {payload_len} payload bytes \
                     but a complete record starts at offset {}",
                    start + 1 + next as u64
                )));
            }
            return Ok(None);
        }

        let body = self
            .backend
            .read_at(start, HEADER_SIZE + payload_len + CRC_SIZE)?;
        let (covered, crc_bytes) = body.split_at(HEADER_SIZE + payload_len);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed = crc32fast::hash(covered);
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        let record = WalRecord::decode_payload(record_type, &covered[HEADER_SIZE..])?;
        self.offset = start + total_len as u64;
        Ok(Some((start, record)))
    }
}

/// Position of the first well-formed, CRC-valid record in `buf`.
fn find_complete_record(buf: &[u8]) -> Option<usize> {
    (0..buf.len()).find(|&pos| is_complete_record(&buf[pos..]))
}

fn is_complete_record(buf: &[u8]) -> bool {
    if buf.len() < HEADER_SIZE || buf[0..4] != WAL_MAGIC {
        return false;
    }
    let version = u16::from_le_bytes([buf[4], buf[5]]);
    if version > WAL_VERSION || WalRecordType::from_byte(buf[6]).is_none() {
        return false;
    }
    let payload_len = u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]) as usize;
    let covered = HEADER_SIZE + payload_len;
    if payload_len > MAX_PAYLOAD_LEN || buf.len() < covered + CRC_SIZE {
        return false;
    }
    let stored = u32::from_le_bytes([
        buf[covered],
        buf[covered + 1],
        buf[covered + 2],
        buf[covered + 3],
    ]);
    stored == crc32fast::hash(&buf[..covered])
}

impl Iterator for WalRecordIterator<'_> {
    type Item = CoreResult<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
