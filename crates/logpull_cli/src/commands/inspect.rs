//! Inspect command implementation.

use logpull_core::{FeedStore, StoreConfig};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory.
    pub path: String,
    /// Engine log size in bytes.
    pub log_size: u64,
    /// Committed transactions in the log.
    pub committed_transactions: u64,
    /// Per-feed statistics.
    pub feeds: Vec<FeedStats>,
}

/// Statistics for a single feed.
#[derive(Debug, Serialize)]
pub struct FeedStats {
    /// Feed name.
    pub name: String,
    /// Highest id assigned.
    pub high_water_mark: u64,
    /// Stored descriptors.
    pub records: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = FeedStore::open(path, StoreConfig::default().create_if_missing(false))?;
    let result = collect(path, &store)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print!("{}", render_text(&result));
        }
    }

    Ok(())
}

fn collect(path: &Path, store: &FeedStore) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let stats = store.stats()?;
    let feeds = store
        .feeds()?
        .into_iter()
        .map(|f| FeedStats {
            name: f.name,
            high_water_mark: f.high_water_mark,
            records: f.records,
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        log_size: stats.log_size,
        committed_transactions: stats.committed_transactions,
        feeds,
    })
}

fn render_text(result: &InspectResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("Store: {}\n", result.path));
    out.push_str(&format!("  Log size:     {} bytes\n", result.log_size));
    out.push_str(&format!("  Transactions: {}\n", result.committed_transactions));
    out.push_str(&format!("  Feeds:        {}\n", result.feeds.len()));
    for feed in &result.feeds {
        out.push_str(&format!(
            "    {:<24} next={:<8} records={}\n",
            feed.name,
            feed.high_water_mark.saturating_add(1),
            feed.records
        ));
    }
    out
}
