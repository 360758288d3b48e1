//! # logpull storage
//!
//! Byte-store backends for the logpull engine.
//!
//! A backend knows nothing about feeds, descriptors or log records. It hands
//! out offsets for appended bytes and gives the same bytes back on request.
//! The engine in `logpull_core` owns every byte layout on top of it.
//!
//! ## Backends
//!
//! - [`FileBackend`] - a single OS file, used by a running server
//! - [`InMemoryBackend`] - a growable buffer, used by tests and throwaway stores
//!
//! ## Example
//!
//! ```rust
//! use logpull_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"feeds/nightly").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"feeds");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
