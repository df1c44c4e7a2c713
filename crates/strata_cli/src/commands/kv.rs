//! Single-key operations.

use anyhow::Context;
use std::path::Path;
use std::time::Duration;
use strata_core::{Config, Store, StoreError};

/// Opens a store for one-shot CLI use: no background compaction, and
/// the directory must already exist for reads.
fn open(path: &Path, create: bool) -> anyhow::Result<Store> {
    let config = Config::new()
        .create_if_missing(create)
        .compaction_interval(Duration::ZERO);
    Store::open(path, config).context("failed to open store")
}

/// Prints the value of `key`.
pub fn get(path: &Path, key: &str) -> anyhow::Result<()> {
    let store = open(path, false)?;

    match store.get(key.as_bytes()) {
        Ok(value) => {
            println!("{}", String::from_utf8_lossy(&value));
            Ok(())
        }
        Err(StoreError::NotFound) => {
            anyhow::bail!("key not found: {key}")
        }
        Err(error) => Err(error).context("read failed"),
    }
}

/// Writes `key` → `value`.
pub fn put(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let store = open(path, true)?;
    store.put(key.as_bytes(), value.as_bytes())?;
    store.close()?;
    Ok(())
}

/// Deletes `key`.
pub fn del(path: &Path, key: &str) -> anyhow::Result<()> {
    let store = open(path, false)?;
    store.delete(key.as_bytes())?;
    store.close()?;
    Ok(())
}
