//! Append command implementation.

use logpull_core::{FeedStore, StoreConfig};
use std::path::Path;

/// Registers `file` in `feed` of the store at `path`.
pub fn run(path: &Path, feed: &str, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = FeedStore::open(path, StoreConfig::default())?;
    let descriptor = store.append_file_to_feed(feed, file)?;
    println!("{}\t{}\t{}", descriptor.id, descriptor.sha256, descriptor.file_path);
    store.close();
    Ok(())
}
