//! Read command implementation.

use logpull_core::{FeedStore, ReadResult, StoreConfig};
use serde::Serialize;
use std::path::Path;

/// One entry in JSON output.
#[derive(Debug, Serialize)]
pub struct ReadEntry {
    /// Descriptor id.
    pub id: u64,
    /// Registered path.
    pub file_path: String,
    /// SHA-256 of the content.
    pub sha256: String,
}

/// JSON output of the read command.
#[derive(Debug, Serialize)]
pub struct ReadOutput {
    /// Feed read.
    pub feed: String,
    /// Cursor for the next read.
    pub next: u64,
    /// Entries returned.
    pub files: Vec<ReadEntry>,
}

/// Prints `feed` from `since` on.
pub fn run(
    path: &Path,
    feed: &str,
    since: u64,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = FeedStore::open(path, StoreConfig::default().create_if_missing(false))?;
    let result = store.read_feed(feed, since)?;
    print!("{}", render(feed, result, format)?);
    Ok(())
}

fn render(feed: &str, result: ReadResult, format: &str) -> Result<String, serde_json::Error> {
    if format == "json" {
        let output = ReadOutput {
            feed: feed.to_string(),
            next: result.next,
            files: result
                .files
                .into_iter()
                .map(|d| ReadEntry {
                    id: d.id,
                    file_path: d.file_path,
                    sha256: d.sha256,
                })
                .collect(),
        };
        return Ok(serde_json::to_string_pretty(&output)? + "\n");
    }

    let mut out = String::new();
    for d in &result.files {
        out.push_str(&format!("{}\t{}\t{}\n", d.id, d.sha256, d.file_path));
    }
    out.push_str(&format!("next: {}\n", result.next));
    Ok(out)
}
