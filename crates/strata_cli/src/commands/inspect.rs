//! Segment table display.

use anyhow::Context;
use std::path::Path;
use std::time::Duration;
use strata_core::{Config, Store};

/// Prints one line per segment, newest first.
pub fn run(path: &Path) -> anyhow::Result<()> {
    let config = Config::new()
        .create_if_missing(false)
        .compaction_interval(Duration::ZERO);
    let store = Store::open(path, config).context("failed to open store")?;

    let stats = store.segment_stats();
    println!("store: {}", store.path().display());
    println!("segments: {}", stats.len());
    println!("{:<12} {:>12} {:>12}  {}", "segment", "bytes", "keys", "state");

    for segment in stats {
        println!(
            "seg-{:06}   {:>12} {:>12}  {}",
            segment.ordinal,
            segment.size,
            segment.indexed_keys,
            if segment.active { "active" } else { "sealed" }
        );
    }

    Ok(())
}
