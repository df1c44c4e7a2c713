//! Append-only segment files.
//!
//! A segment is a concatenation of encoded [`Record`] frames plus an
//! in-memory index mapping each key to the offset of its *latest*
//! record within the file. Element zero of the store's segment list is
//! the active (writable) segment; the rest are sealed and read-only.

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use strata_storage::{FileBackend, StorageBackend};

/// One append-only segment file and its key index.
pub struct Segment {
    /// Monotonically assigned ordinal; higher means newer.
    ordinal: u64,
    /// Path of the backing file.
    path: PathBuf,
    /// Byte store holding the encoded frames.
    backend: Box<dyn StorageBackend>,
    /// Key → offset of that key's latest record in this file.
    index: HashMap<Vec<u8>, u64>,
    /// Current file size in bytes.
    size: u64,
}

impl Segment {
    /// Creates a fresh, empty segment file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if a non-empty file already
    /// exists at `path` - ordinals are never reused, so that would mean
    /// the directory is inconsistent.
    pub fn create(ordinal: u64, path: PathBuf) -> StoreResult<Self> {
        let backend = FileBackend::open(&path)?;
        if backend.size()? != 0 {
            return Err(StoreError::corrupt(format!(
                "new segment file is not empty: {}",
                path.display()
            )));
        }

        Ok(Self {
            ordinal,
            path,
            backend: Box::new(backend),
            index: HashMap::new(),
            size: 0,
        })
    }

    /// Opens an existing segment file and rebuilds its index.
    pub fn open(ordinal: u64, path: PathBuf) -> StoreResult<Self> {
        let backend = FileBackend::open(&path)?;
        Self::with_backend(ordinal, path, Box::new(backend))
    }

    /// Builds a segment over an arbitrary backend, rebuilding the index
    /// by streaming through the stored frames.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if any frame's length fields
    /// point past the end of the file.
    pub fn with_backend(
        ordinal: u64,
        path: PathBuf,
        backend: Box<dyn StorageBackend>,
    ) -> StoreResult<Self> {
        let (index, size) = build_index(backend.as_ref())?;

        Ok(Self {
            ordinal,
            path,
            backend,
            index,
            size,
        })
    }

    /// Returns the segment's ordinal.
    #[must_use]
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the number of distinct keys indexed in this segment.
    #[must_use]
    pub fn indexed_keys(&self) -> usize {
        self.index.len()
    }

    /// Returns the offset of `key`'s latest record, if present.
    #[must_use]
    pub fn lookup(&self, key: &[u8]) -> Option<u64> {
        self.index.get(key).copied()
    }

    /// Appends a record and indexes it.
    ///
    /// Returns the offset the record was written at.
    pub fn append(&mut self, record: &Record) -> StoreResult<u64> {
        let encoded = record.encode();
        let offset = self.backend.append(&encoded)?;
        self.index.insert(record.key.clone(), offset);
        self.size += encoded.len() as u64;
        Ok(offset)
    }

    /// Reads and verifies the record at `offset`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Corrupt`] if the frame extends past end of file
    /// - [`StoreError::ChecksumMismatch`] if the stored CRC disagrees
    ///   with the key and value bytes
    pub fn read_record(&self, offset: u64) -> StoreResult<Record> {
        if offset + Record::HEADER_SIZE as u64 > self.size {
            return Err(StoreError::corrupt("frame header past end of segment"));
        }

        let header = self.backend.read_at(offset, Record::HEADER_SIZE)?;
        let record_len =
            u64::from(u32::from_le_bytes([header[0], header[1], header[2], header[3]]));

        if record_len < Record::MIN_FRAME_SIZE as u64 || offset + record_len > self.size {
            return Err(StoreError::corrupt("frame extends past end of segment"));
        }

        let frame = self.backend.read_at(offset, record_len as usize)?;
        Record::decode(&frame)
    }

    /// Decodes every record in file order, verifying checksums.
    pub fn scan(&self) -> StoreResult<Vec<Record>> {
        let mut records = Vec::new();
        let mut offset = 0u64;

        while offset < self.size {
            let record = self.read_record(offset)?;
            offset += record.encoded_size() as u64;
            records.push(record);
        }

        Ok(records)
    }

    /// Syncs the backing file to durable storage.
    pub fn sync(&mut self) -> StoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("ordinal", &self.ordinal)
            .field("path", &self.path)
            .field("size", &self.size)
            .field("indexed_keys", &self.index.len())
            .finish_non_exhaustive()
    }
}

/// Streams through a backend's frames, validating bounds and recording
/// the latest offset per key.
fn build_index(backend: &dyn StorageBackend) -> StoreResult<(HashMap<Vec<u8>, u64>, u64)> {
    let size = backend.size()?;
    let mut index = HashMap::new();
    let mut offset = 0u64;

    while offset < size {
        if offset + Record::HEADER_SIZE as u64 > size {
            return Err(StoreError::corrupt("frame header past end of segment"));
        }

        let header = backend.read_at(offset, Record::HEADER_SIZE)?;
        let record_len =
            u64::from(u32::from_le_bytes([header[0], header[1], header[2], header[3]]));
        let key_len = u64::from(u32::from_le_bytes([header[4], header[5], header[6], header[7]]));
        let value_field = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        let value_len = if value_field == Record::TOMBSTONE_LEN {
            0
        } else {
            u64::from(value_field)
        };

        let expected_len =
            Record::HEADER_SIZE as u64 + key_len + value_len + Record::TRAILER_SIZE as u64;
        if record_len != expected_len || offset + record_len > size {
            return Err(StoreError::corrupt("frame extends past end of segment"));
        }

        let key = backend.read_at(offset + Record::HEADER_SIZE as u64, key_len as usize)?;
        index.insert(key, offset);

        offset += record_len;
    }

    Ok((index, size))
}
