//! Store facade and background compaction.
//!
//! ## Concurrency
//!
//! - `put`/`delete` serialize through a single writer lock; only the
//!   writer touches the active segment
//! - `get` takes the segment list's shared lock and may run alongside
//!   a writer and other readers
//! - the compactor thread merges sealed segments under the shared lock
//!   and takes the exclusive lock only for the final swap; the active
//!   segment is never touched
//! - `close` signals the compactor, joins it, then syncs segments;
//!   later operations return [`StoreError::Closed`]

use crate::compaction::merge_segments;
use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use crate::segment::Segment;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use strata_storage::{FileBackend, StorageBackend};
use tracing::{debug, info, warn};

/// Per-segment summary for tooling.
#[derive(Debug, Clone)]
pub struct SegmentStats {
    /// Segment ordinal.
    pub ordinal: u64,
    /// File size in bytes.
    pub size: u64,
    /// Distinct keys indexed in the segment.
    pub indexed_keys: usize,
    /// Whether this is the active (writable) segment.
    pub active: bool,
}

/// A durable, log-structured key-value store.
///
/// Opening a store locks its directory, rebuilds every segment's index
/// by streaming through the files, and launches the background
/// compactor. The highest-ordinal segment becomes the active one.
///
/// Keys are non-empty opaque byte strings; values are opaque byte
/// strings and may be empty.
pub struct Store {
    inner: Arc<StoreInner>,
    compactor: Mutex<Option<Compactor>>,
}

struct Compactor {
    shutdown: Sender<()>,
    thread: JoinHandle<()>,
}

struct StoreInner {
    dir: StoreDir,
    config: Config,
    /// Segment list, newest first: `[0]` is active, the rest sealed.
    segments: RwLock<Vec<Segment>>,
    /// Serializes all mutation.
    write_lock: Mutex<()>,
    /// Next segment ordinal; never reused.
    next_ordinal: AtomicU64,
    closed: AtomicBool,
}

impl Store {
    /// Opens or creates a store rooted at `path`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Locked`] if another process holds the directory
    /// - [`StoreError::Corrupt`] if a segment frame's length fields
    ///   point past end of file
    pub fn open(path: impl AsRef<Path>, config: Config) -> StoreResult<Self> {
        let dir = StoreDir::open(path.as_ref(), config.create_if_missing)?;
        let ordinals = dir.scan_segments()?;

        // Newest first; the highest ordinal is the active segment.
        let mut segments = Vec::with_capacity(ordinals.len().max(1));
        for &ordinal in ordinals.iter().rev() {
            segments.push(Segment::open(ordinal, dir.segment_path(ordinal))?);
        }
        if segments.is_empty() {
            segments.push(Segment::create(0, dir.segment_path(0))?);
        }

        let next_ordinal = segments[0].ordinal() + 1;
        info!(
            path = %dir.path().display(),
            segments = segments.len(),
            "store opened"
        );

        let inner = Arc::new(StoreInner {
            dir,
            config,
            segments: RwLock::new(segments),
            write_lock: Mutex::new(()),
            next_ordinal: AtomicU64::new(next_ordinal),
            closed: AtomicBool::new(false),
        });

        let compactor = spawn_compactor(&inner)?;

        Ok(Self {
            inner,
            compactor: Mutex::new(compactor),
        })
    }

    /// Opens a store with the default configuration.
    pub fn open_with_defaults(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(path, Config::default())
    }

    /// Reads the newest value for `key`.
    ///
    /// Segments are consulted newest to oldest; the first one whose
    /// index contains the key is authoritative. A tombstone there means
    /// the key is deleted and older segments are *not* consulted.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the key is absent or tombstoned
    /// - [`StoreError::ChecksumMismatch`] if the record fails
    ///   verification (older segments are *not* consulted)
    pub fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.inner.ensure_open()?;

        let segments = self.inner.segments.read();
        for segment in segments.iter() {
            if let Some(offset) = segment.lookup(key) {
                let record = segment.read_record(offset)?;
                if record.is_tombstone() {
                    return Err(StoreError::NotFound);
                }
                return Ok(record.value);
            }
        }

        Err(StoreError::NotFound)
    }

    /// Writes `key` → `value`.
    ///
    /// Seals the active segment and starts a fresh one first if the
    /// record would push it past the configured maximum size.
    ///
    /// # Errors
    ///
    /// [`StoreError::BadKey`] for an empty key.
    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner
            .write(Record::put(key.to_vec(), value.to_vec()))
    }

    /// Deletes `key` by writing a tombstone.
    ///
    /// Idempotent: deleting an absent key succeeds. A later
    /// [`Store::put`] makes the key visible again.
    pub fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.inner.write(Record::tombstone(key.to_vec()))
    }

    /// Closes the store: stops the compactor, joins it, and syncs all
    /// segments. Subsequent operations return [`StoreError::Closed`].
    ///
    /// Closing an already-closed store is a no-op.
    pub fn close(&self) -> StoreResult<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(compactor) = self.compactor.lock().take() {
            let _ = compactor.shutdown.send(());
            if compactor.thread.join().is_err() {
                warn!("compactor thread panicked during shutdown");
            }
        }

        let mut segments = self.inner.segments.write();
        for segment in segments.iter_mut() {
            segment.sync()?;
        }

        info!("store closed");
        Ok(())
    }

    /// Returns whether the store is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::SeqCst)
    }

    /// Returns the current segment count (active + sealed).
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.inner.segments.read().len()
    }

    /// Returns a per-segment summary, newest first.
    #[must_use]
    pub fn segment_stats(&self) -> Vec<SegmentStats> {
        let segments = self.inner.segments.read();
        segments
            .iter()
            .enumerate()
            .map(|(position, segment)| SegmentStats {
                ordinal: segment.ordinal(),
                size: segment.size(),
                indexed_keys: segment.indexed_keys(),
                active: position == 0,
            })
            .collect()
    }

    /// Returns the store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.dir.path()
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.dir.path())
            .field("open", &self.is_open())
            .field("segments", &self.segment_count())
            .finish_non_exhaustive()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl StoreInner {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Appends a record to the active segment, rotating first if it
    /// would overflow. All mutation funnels through here.
    fn write(&self, record: Record) -> StoreResult<()> {
        self.ensure_open()?;
        if record.key.is_empty() {
            return Err(StoreError::BadKey);
        }

        let frame_len = record.encoded_size() as u64;
        let _writer = self.write_lock.lock();
        // Close may have won the race for the writer lock.
        self.ensure_open()?;

        let mut segments = self.segments.write();
        if segments[0].size() + frame_len > self.config.max_segment_size {
            let ordinal = self.next_ordinal.fetch_add(1, Ordering::SeqCst);
            let fresh = Segment::create(ordinal, self.dir.segment_path(ordinal))?;
            debug!(
                sealed = segments[0].ordinal(),
                active = ordinal,
                "active segment sealed"
            );
            segments.insert(0, fresh);
        }

        segments[0].append(&record)?;
        if self.config.sync_on_write {
            segments[0].sync()?;
        }

        Ok(())
    }

    /// One compactor tick: merge all sealed segments into one when the
    /// segment count reaches the threshold.
    ///
    /// The merged output is staged under a `.tmp` name and then renamed
    /// over the newest sealed segment's file, so an abort at any point
    /// before the swap leaves the store unchanged. Sealed segments
    /// created by concurrent rotation while the merge runs are newer
    /// than its input and are left alone.
    fn compact_if_needed(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        let (records, stats, target, snapshot) = {
            let segments = self.segments.read();
            if segments.len() < self.config.compaction_threshold {
                return Ok(());
            }
            let sealed: Vec<&Segment> = segments[1..].iter().collect();
            if sealed.is_empty() {
                return Ok(());
            }

            let (records, stats) = merge_segments(&sealed)?;
            // The merged output inherits the newest sealed ordinal so
            // the on-disk order (highest ordinal = newest) survives a
            // reopen.
            let target = sealed[0].ordinal();
            let snapshot: Vec<u64> = sealed.iter().map(|segment| segment.ordinal()).collect();
            (records, stats, target, snapshot)
        };

        if let Err(error) = self.write_merged(target, &records) {
            let _ = std::fs::remove_file(self.dir.temp_segment_path(target));
            return Err(error);
        }

        {
            let mut segments = self.segments.write();
            self.dir.publish_segment(target)?;
            let merged = Segment::open(target, self.dir.segment_path(target))?;
            segments.retain(|segment| !snapshot.contains(&segment.ordinal()));
            segments.push(merged);
        }

        let stale: Vec<u64> = snapshot.into_iter().filter(|&o| o != target).collect();
        self.dir.remove_segments(&stale)?;

        info!(
            input = stats.input_records,
            output = stats.output_records,
            tombstones = stats.tombstones_dropped,
            reclaimed = stats.bytes_reclaimed,
            "sealed segments compacted"
        );
        Ok(())
    }

    /// Writes the merged records to `seg-<ordinal>.tmp` and syncs it.
    fn write_merged(&self, ordinal: u64, records: &[Record]) -> StoreResult<()> {
        let path = self.dir.temp_segment_path(ordinal);
        // A previous aborted cycle may have left a partial file behind.
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let mut backend = FileBackend::open(&path)?;
        for record in records {
            backend.append(&record.encode())?;
        }
        backend.sync()?;
        Ok(())
    }
}

/// Spawns the compactor thread unless compaction is disabled.
fn spawn_compactor(inner: &Arc<StoreInner>) -> StoreResult<Option<Compactor>> {
    let interval = inner.config.compaction_interval;
    if interval.is_zero() {
        return Ok(None);
    }

    let (shutdown, wake) = mpsc::channel();
    let worker = Arc::clone(inner);
    let thread = thread::Builder::new()
        .name("strata-compactor".into())
        .spawn(move || compactor_loop(&worker, &wake, interval))?;

    Ok(Some(Compactor { shutdown, thread }))
}

fn compactor_loop(inner: &StoreInner, wake: &Receiver<()>, interval: Duration) {
    loop {
        match wake.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if let Err(error) = inner.compact_if_needed() {
                    warn!(%error, "compaction failed; retrying next tick");
                }
            }
            // Close signalled, or the store handle went away entirely.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
