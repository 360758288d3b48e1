//! Named, append-only feeds of file descriptors.

mod descriptor;
mod store;

pub use descriptor::{DescriptorRecord, FileDescriptor};
pub use store::{FeedStore, FeedSummary, ReadResult};
