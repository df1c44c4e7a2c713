//! Store directory management.
//!
//! File system layout:
//!
//! ```text
//! <store_dir>/
//! ├─ LOCK            # advisory lock, single process
//! ├─ seg-000000      # segment files: `seg-` + ordinal
//! ├─ seg-000001
//! └─ seg-000001.tmp  # transient compaction output
//! ```
//!
//! Segment files carry the `seg-` prefix followed by their ordinal;
//! compaction writes its output under a `.tmp` suffix and publishes it
//! with an atomic rename followed by a directory fsync.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Advisory lock file name.
const LOCK_FILE: &str = "LOCK";
/// Prefix shared by all segment files.
const SEGMENT_PREFIX: &str = "seg-";
/// Suffix of in-flight compaction output.
const TMP_SUFFIX: &str = ".tmp";

/// Manages the store directory: locking, segment naming, discovery and
/// atomic replacement.
///
/// # Thread Safety
///
/// `StoreDir` holds an exclusive advisory lock on the directory; only
/// one instance can exist per directory at a time. The lock is released
/// when the instance is dropped.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and acquires its lock.
    ///
    /// Leftover `.tmp` files from an interrupted compaction are removed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Corrupt`] if the path is missing (with
    ///   `create_if_missing` false) or is not a directory
    /// - [`StoreError::Locked`] if another process holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::corrupt(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::corrupt(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        let dir = Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        };
        dir.remove_stale_temps()?;

        Ok(dir)
    }

    /// Returns the store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the segment file with the given ordinal.
    #[must_use]
    pub fn segment_path(&self, ordinal: u64) -> PathBuf {
        self.path.join(format!("{SEGMENT_PREFIX}{ordinal:06}"))
    }

    /// Returns the temporary path used while writing a merged segment.
    #[must_use]
    pub fn temp_segment_path(&self, ordinal: u64) -> PathBuf {
        self.path
            .join(format!("{SEGMENT_PREFIX}{ordinal:06}{TMP_SUFFIX}"))
    }

    /// Discovers existing segment files.
    ///
    /// Returns their ordinals sorted ascending. `LOCK` and `.tmp` files
    /// are ignored.
    pub fn scan_segments(&self) -> StoreResult<Vec<u64>> {
        let mut ordinals = Vec::new();

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(ordinal) = parse_ordinal(&name.to_string_lossy()) {
                ordinals.push(ordinal);
            }
        }

        ordinals.sort_unstable();
        Ok(ordinals)
    }

    /// Publishes a merged segment: renames `seg-<ordinal>.tmp` over
    /// `seg-<ordinal>` and fsyncs the directory so the swap is durable.
    pub fn publish_segment(&self, ordinal: u64) -> StoreResult<()> {
        fs::rename(self.temp_segment_path(ordinal), self.segment_path(ordinal))?;
        self.sync_directory()?;
        Ok(())
    }

    /// Deletes the segment files for the given ordinals.
    ///
    /// Returns the number of files removed. The directory is fsynced
    /// afterwards so the deletions are crash-safe.
    pub fn remove_segments(&self, ordinals: &[u64]) -> StoreResult<usize> {
        let mut removed = 0;

        for &ordinal in ordinals {
            let path = self.segment_path(ordinal);
            if path.exists() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }

        if removed > 0 {
            self.sync_directory()?;
        }

        Ok(removed)
    }

    /// Removes leftover `.tmp` files from an interrupted compaction.
    fn remove_stale_temps(&self) -> StoreResult<()> {
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(SEGMENT_PREFIX) && name.ends_with(TMP_SUFFIX) {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Fsyncs the directory so entry creations, renames and deletions
    /// are durable.
    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StoreResult<()> {
        // NTFS journaling covers metadata durability; directory fsync
        // is not supported on Windows.
        Ok(())
    }
}

/// Parses a segment ordinal out of a file name.
///
/// `"seg-000042"` → `Some(42)`; `LOCK` and `.tmp` names → `None`.
fn parse_ordinal(name: &str) -> Option<u64> {
    if name.ends_with(TMP_SUFFIX) {
        return None;
    }
    name.strip_prefix(SEGMENT_PREFIX)?.parse().ok()
}
