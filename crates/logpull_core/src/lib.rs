//! # logpull core
//!
//! The storage side of logpull: clients register files into named,
//! append-only feeds and later poll each feed for entries past a cursor.
//!
//! This crate provides:
//! - [`FeedStore`] - per-feed append, cursor reads and point lookups
//! - [`checksum`] - streaming SHA-256 fingerprints of registered files
//! - [`engine`] - the write-ahead-logged bucket store the feeds live in
//!
//! ## Example
//!
//! ```rust
//! use logpull_core::{DescriptorRecord, FeedStore};
//!
//! let store = FeedStore::in_memory().unwrap();
//! store
//!     .append_record("nightly", DescriptorRecord::new("/srv/a.tar", "00"))
//!     .unwrap();
//!
//! let page = store.read_feed("nightly", 0).unwrap();
//! assert_eq!(page.files.len(), 1);
//! assert_eq!(page.next, 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod checksum;
mod config;
mod dir;
pub mod engine;
mod error;
mod feed;
mod types;

pub use config::StoreConfig;
pub use dir::StoreDir;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use feed::{DescriptorRecord, FeedStore, FeedSummary, FileDescriptor, ReadResult};
pub use types::TransactionId;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
