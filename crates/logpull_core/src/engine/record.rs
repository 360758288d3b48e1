//! Log record types and their payload encoding.

use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;

/// Magic bytes opening every log record.
pub const WAL_MAGIC: [u8; 4] = *b"LPWL";

/// Current log format version.
pub const WAL_VERSION: u16 = 1;

/// Envelope header size: magic (4) + version (2) + type (1) + length (4).
pub const HEADER_SIZE: usize = 11;

/// Size of the trailing CRC.
pub const CRC_SIZE: usize = 4;

/// Largest payload a record may carry. Longer length fields are corruption.
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Type byte of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// Opens a transaction batch.
    Begin = 1,
    /// Creates an empty bucket.
    CreateBucket = 2,
    /// Raises a bucket's sequence counter.
    Sequence = 3,
    /// Stores one key/value pair.
    Put = 4,
    /// Closes and commits a transaction batch.
    Commit = 5,
}

impl WalRecordType {
    /// Converts a type byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::CreateBucket),
            3 => Some(Self::Sequence),
            4 => Some(Self::Put),
            5 => Some(Self::Commit),
            _ => None,
        }
    }

    /// The type byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One entry of the write-ahead log.
///
/// A committed transaction is written as `Begin`, its data records, then
/// `Commit`, all in a single contiguous batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Opens a batch.
    Begin {
        /// Transaction id.
        txid: TransactionId,
    },
    /// Creates a bucket.
    CreateBucket {
        /// Bucket name.
        bucket: Vec<u8>,
    },
    /// Sets a bucket's sequence counter.
    Sequence {
        /// Bucket name.
        bucket: Vec<u8>,
        /// New counter value.
        value: u64,
    },
    /// Stores a value.
    Put {
        /// Bucket name.
        bucket: Vec<u8>,
        /// Key.
        key: Vec<u8>,
        /// Value.
        value: Vec<u8>,
    },
    /// Commits a batch.
    Commit {
        /// Transaction id, matching the batch's `Begin`.
        txid: TransactionId,
    },
}

impl WalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Begin { .. } => WalRecordType::Begin,
            Self::CreateBucket { .. } => WalRecordType::CreateBucket,
            Self::Sequence { .. } => WalRecordType::Sequence,
            Self::Put { .. } => WalRecordType::Put,
            Self::Commit { .. } => WalRecordType::Commit,
        }
    }

    /// Serializes the payload (no envelope).
    ///
    /// # Errors
    ///
    /// Fails if a byte field is longer than `u32::MAX`.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::Begin { txid } | Self::Commit { txid } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
            }
            Self::CreateBucket { bucket } => {
                put_bytes(&mut buf, bucket)?;
            }
            Self::Sequence { bucket, value } => {
                put_bytes(&mut buf, bucket)?;
                buf.extend_from_slice(&value.to_le_bytes());
            }
            Self::Put { bucket, key, value } => {
                put_bytes(&mut buf, bucket)?;
                put_bytes(&mut buf, key)?;
                put_bytes(&mut buf, value)?;
            }
        }
        Ok(buf)
    }

    /// Deserializes a payload of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalCorruption`] on short or over-long payloads.
    pub fn decode_payload(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut reader = PayloadReader { payload, pos: 0 };
        let record = match record_type {
            WalRecordType::Begin => Self::Begin {
                txid: TransactionId::new(reader.u64()?),
            },
            WalRecordType::Commit => Self::Commit {
                txid: TransactionId::new(reader.u64()?),
            },
            WalRecordType::CreateBucket => Self::CreateBucket {
                bucket: reader.bytes()?,
            },
            WalRecordType::Sequence => Self::Sequence {
                bucket: reader.bytes()?,
                value: reader.u64()?,
            },
            WalRecordType::Put => Self::Put {
                bucket: reader.bytes()?,
                key: reader.bytes()?,
                value: reader.bytes()?,
            },
        };

        if reader.pos != payload.len() {
            return Err(CoreError::wal_corruption(format!(
                "trailing bytes in {:?} record: used {} of {}",
                record_type,
                reader.pos,
                payload.len()
            )));
        }
        Ok(record)
    }

    /// Encodes the record with its envelope and CRC.
    ///
    /// # Errors
    ///
    /// Fails if the payload is longer than [`MAX_PAYLOAD_LEN`].
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len as usize <= MAX_PAYLOAD_LEN)
            .ok_or_else(|| CoreError::invalid_operation("WAL record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&WAL_MAGIC);
        data.extend_from_slice(&WAL_VERSION.to_le_bytes());
        data.push(self.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> CoreResult<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| CoreError::invalid_operation("WAL field longer than 4 GiB"))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl PayloadReader<'_> {
    fn take(&mut self, n: usize) -> CoreResult<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| CoreError::wal_corruption("unexpected end of payload"))?;
        let slice = &self.payload[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| CoreError::wal_corruption("invalid u64"))?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn bytes(&mut self) -> CoreResult<Vec<u8>> {
        let len: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| CoreError::wal_corruption("invalid length prefix"))?;
        Ok(self.take(u32::from_le_bytes(len) as usize)?.to_vec())
    }
}
