//! The feed store.

use crate::checksum;
use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::engine::{Bucket, Engine, EngineStats, ReadBucket, WriteBucket};
use crate::error::{CoreError, CoreResult};
use crate::feed::descriptor::{DescriptorRecord, FileDescriptor};
use logpull_storage::FileBackend;
use std::path::Path;

/// Buckets holding feeds are named `feeds/<name>`.
const FEED_PREFIX: &[u8] = b"feeds/";

fn bucket_name(feed: &str) -> Vec<u8> {
    let mut name = FEED_PREFIX.to_vec();
    name.extend_from_slice(feed.as_bytes());
    name
}

/// Outcome of a cursor read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    /// Descriptors with `id >= since`, ascending.
    pub files: Vec<FileDescriptor>,
    /// Highest id ever assigned in the feed, plus one.
    pub next: u64,
}

/// One feed as listed by [`FeedStore::feeds`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSummary {
    /// Feed name.
    pub name: String,
    /// Highest id assigned so far (0 for none).
    pub high_water_mark: u64,
    /// Number of stored descriptors.
    pub records: usize,
}

/// Durable, per-feed append log with cursor reads and point lookups.
///
/// One store is opened per process and shared by reference; it does no
/// locking of its own beyond what the engine provides.
#[derive(Debug)]
pub struct FeedStore {
    engine: Engine,
    dir: Option<StoreDir>,
}

impl FeedStore {
    /// Opens (or creates) the store in the data directory `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::StoreLocked`] if another process has the directory
    /// - [`CoreError::InvalidFormat`] if the directory is missing and may
    ///   not be created
    /// - recovery errors from the engine log
    pub fn open(path: &Path, config: StoreConfig) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open_with_create_dirs(&dir.db_path())?;
        let engine = Engine::open(Box::new(backend), config.sync_on_commit)?;

        tracing::info!(path = %path.display(), "feed store opened");
        Ok(Self {
            engine,
            dir: Some(dir),
        })
    }

    /// Opens an empty store that lives only in memory.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn in_memory() -> CoreResult<Self> {
        Ok(Self {
            engine: Engine::in_memory()?,
            dir: None,
        })
    }

    /// Data directory, or `None` for an in-memory store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// Registers the file at `path` in `feed`.
    ///
    /// The file is hashed first; nothing is written if that fails.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] for a relative path or empty feed name
    /// - [`CoreError::Io`] if the file cannot be read
    /// - engine errors from the append
    pub fn append_file_to_feed(&self, feed: &str, path: &str) -> CoreResult<FileDescriptor> {
        validate_feed(feed)?;
        if !Path::new(path).is_absolute() {
            return Err(CoreError::invalid_argument(format!(
                "file path must be absolute: {path}"
            )));
        }

        let sha256 = checksum::sha256_file(Path::new(path))?;
        self.append_record(feed, DescriptorRecord::new(path, sha256))
    }

    /// Appends a descriptor as given, creating the feed if needed.
    ///
    /// The id is taken from the feed's sequence counter inside the same
    /// transaction that stores the record.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArgument`] for an empty feed name, otherwise
    /// encoding or engine errors.
    pub fn append_record(&self, feed: &str, record: DescriptorRecord) -> CoreResult<FileDescriptor> {
        validate_feed(feed)?;
        let value = record.encode()?;

        let id = self.engine.update(|tx| {
            let mut bucket = tx.create_bucket_if_not_exists(&bucket_name(feed))?;
            let id = bucket.next_sequence()?;
            bucket.put(&id.to_be_bytes(), value)?;
            Ok(id)
        })?;

        tracing::debug!(feed, id, file = %record.file_path, "appended");
        Ok(record.with_id(id))
    }

    /// Every descriptor in `feed` with `id >= since`, plus the next cursor.
    ///
    /// A feed that was never appended to reads as empty with `next == 1`.
    ///
    /// # Errors
    ///
    /// [`CoreError::CorruptRecord`] if any descriptor in range fails to
    /// decode; the whole read fails.
    pub fn read_feed(&self, feed: &str, since: u64) -> CoreResult<ReadResult> {
        self.engine.view(|tx| {
            let Some(bucket) = tx.bucket(&bucket_name(feed)) else {
                return Ok(ReadResult {
                    files: Vec::new(),
                    next: 1,
                });
            };

            let files = bucket
                .scan_from(&since.to_be_bytes())
                .map(|(key, value)| decode_entry(feed, key, value))
                .collect::<CoreResult<Vec<_>>>()?;

            Ok(ReadResult {
                files,
                next: bucket.sequence().saturating_add(1),
            })
        })
    }

    /// Looks up one descriptor by id.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if the feed or id does not exist,
    /// [`CoreError::CorruptRecord`] if the stored value fails to decode.
    pub fn get_by_id(&self, feed: &str, id: u64) -> CoreResult<FileDescriptor> {
        let key = id.to_be_bytes();
        self.engine.view(|tx| {
            let value = tx
                .bucket(&bucket_name(feed))
                .as_ref()
                .and_then(|bucket| bucket.get(&key).map(<[u8]>::to_vec))
                .ok_or_else(|| CoreError::not_found(feed, id))?;
            decode_entry(feed, &key, &value)
        })
    }

    /// Highest id assigned in `feed`, or 0 if it has none.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn high_water_mark(&self, feed: &str) -> CoreResult<u64> {
        self.engine.view(|tx| {
            Ok(tx
                .bucket(&bucket_name(feed))
                .map_or(0, |bucket| bucket.sequence()))
        })
    }

    /// All feeds, in name order.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn feeds(&self) -> CoreResult<Vec<FeedSummary>> {
        self.engine.view(|tx| {
            Ok(tx
                .buckets_with_prefix(FEED_PREFIX)
                .map(|bucket| summarize(&bucket))
                .collect())
        })
    }

    /// Engine counters.
    ///
    /// # Errors
    ///
    /// Fails if the log size cannot be read.
    pub fn stats(&self) -> CoreResult<EngineStats> {
        self.engine.stats()
    }

    /// Closes the store and releases the data directory lock.
    ///
    /// Every append is already durable when it returns, so there is nothing
    /// to flush.
    pub fn close(self) {
        if let Some(path) = self.path() {
            tracing::info!(path = %path.display(), "feed store closed");
        }
    }
}

fn validate_feed(feed: &str) -> CoreResult<()> {
    if feed.is_empty() {
        return Err(CoreError::invalid_argument("feed name must not be empty"));
    }
    Ok(())
}

fn summarize(bucket: &Bucket<'_>) -> FeedSummary {
    let name = bucket
        .name()
        .strip_prefix(FEED_PREFIX)
        .unwrap_or(bucket.name());
    FeedSummary {
        name: String::from_utf8_lossy(name).into_owned(),
        high_water_mark: bucket.sequence(),
        records: bucket.len(),
    }
}

fn decode_entry(feed: &str, key: &[u8], value: &[u8]) -> CoreResult<FileDescriptor> {
    let id = match <[u8; 8]>::try_from(key) {
        Ok(bytes) => u64::from_be_bytes(bytes),
        Err(_) => {
            tracing::error!(feed, key_len = key.len(), "feed key is not 8 bytes");
            return Err(CoreError::corrupt_record(
                feed,
                0,
                format!("key of {} bytes", key.len()),
            ));
        }
    };

    DescriptorRecord::decode(value)
        .map(|record| record.with_id(id))
        .map_err(|message| {
            tracing::error!(feed, id, error = %message, "undecodable descriptor");
            CoreError::corrupt_record(feed, id, message)
        })
}
