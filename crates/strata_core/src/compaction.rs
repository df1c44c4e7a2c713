//! Sealed-segment merging.
//!
//! Compaction folds every sealed segment into a single output holding
//! only the latest record per key.
//!
//! ## Invariants
//!
//! - Merging **MUST NOT** change logical state: every key visible
//!   before the merge reads the same value after it
//! - Newest record per key wins (segments are visited newest to
//!   oldest, latest occurrence first within each file)
//! - Tombstones shadow older records during the merge and are dropped
//!   from the output - all sealed segments participate, so there is no
//!   older segment left for a tombstone to mask

use crate::error::StoreResult;
use crate::record::Record;
use crate::segment::Segment;
use std::collections::HashMap;

/// Outcome of one merge, for logging.
#[derive(Debug)]
pub struct MergeStats {
    /// Records read from the input segments.
    pub input_records: usize,
    /// Records written to the merged output.
    pub output_records: usize,
    /// Tombstones dropped from the output.
    pub tombstones_dropped: usize,
    /// Shadowed older versions dropped.
    pub obsolete_dropped: usize,
    /// Bytes reclaimed (input size minus output size).
    pub bytes_reclaimed: u64,
}

/// Merges sealed segments, newest first, into the surviving record set.
///
/// Output is sorted by key for deterministic segment files.
///
/// # Errors
///
/// Propagates read and checksum errors from the input segments; the
/// caller aborts the compaction cycle and retries on the next tick.
pub fn merge_segments(sealed: &[&Segment]) -> StoreResult<(Vec<Record>, MergeStats)> {
    let mut latest: HashMap<Vec<u8>, Record> = HashMap::new();
    let mut input_records = 0usize;
    let mut input_bytes = 0u64;
    let mut obsolete_dropped = 0usize;

    for segment in sealed {
        input_bytes += segment.size();
        let records = segment.scan()?;
        input_records += records.len();

        // Reverse file order puts each key's latest occurrence first.
        for record in records.into_iter().rev() {
            if latest.contains_key(&record.key) {
                obsolete_dropped += 1;
            } else {
                latest.insert(record.key.clone(), record);
            }
        }
    }

    let mut tombstones_dropped = 0usize;
    let mut output = Vec::with_capacity(latest.len());
    for (_, record) in latest {
        if record.is_tombstone() {
            tombstones_dropped += 1;
        } else {
            output.push(record);
        }
    }
    output.sort_by(|a, b| a.key.cmp(&b.key));

    let output_bytes: u64 = output.iter().map(|r| r.encoded_size() as u64).sum();

    let stats = MergeStats {
        input_records,
        output_records: output.len(),
        tombstones_dropped,
        obsolete_dropped,
        bytes_reclaimed: input_bytes.saturating_sub(output_bytes),
    };

    Ok((output, stats))
}
