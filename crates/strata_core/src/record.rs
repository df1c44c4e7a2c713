//! On-disk record framing.
//!
//! Every record is a self-describing little-endian frame:
//!
//! ```text
//! | record_len (4) | key_len (4) | value_len (4) | key (K) | value (V) | crc32 (4) |
//! ```
//!
//! `record_len` counts the whole frame, including the length field
//! itself. The checksum covers `key ‖ value` only, so a damaged length
//! field surfaces as a framing error rather than a checksum failure.
//!
//! A tombstone carries no value bytes and is tagged by the reserved
//! `value_len` sentinel [`Record::TOMBSTONE_LEN`]; every byte string,
//! including the empty one, therefore remains a legal value.

use crate::error::{StoreError, StoreResult};

/// A single key-value record, either live or a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Key bytes.
    pub key: Vec<u8>,
    /// Value bytes; empty for tombstones.
    pub value: Vec<u8>,
    /// Whether this record marks a deletion.
    tombstone: bool,
}

impl Record {
    /// Fixed header: record_len (4) + key_len (4) + value_len (4).
    pub const HEADER_SIZE: usize = 12;
    /// Trailing CRC32.
    pub const TRAILER_SIZE: usize = 4;
    /// Smallest legal frame: header + trailer around an empty key.
    pub const MIN_FRAME_SIZE: usize = Self::HEADER_SIZE + Self::TRAILER_SIZE;
    /// `value_len` sentinel marking a tombstone.
    pub const TOMBSTONE_LEN: u32 = u32::MAX;

    /// Creates a live record.
    #[must_use]
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            tombstone: false,
        }
    }

    /// Creates a tombstone for `key`.
    #[must_use]
    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            tombstone: true,
        }
    }

    /// Returns whether this record marks a deletion.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.tombstone
    }

    /// Returns the encoded size of this record in bytes.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::HEADER_SIZE + self.key.len() + self.value.len() + Self::TRAILER_SIZE
    }

    /// Encodes the record into its on-disk frame.
    ///
    /// Keys and values are bounded by the 4-byte length fields; a value
    /// of `u32::MAX` bytes or more would collide with the tombstone
    /// sentinel and is outside the engine's supported range.
    pub fn encode(&self) -> Vec<u8> {
        let record_len = self.encoded_size();
        let value_len_field = if self.tombstone {
            Self::TOMBSTONE_LEN
        } else {
            self.value.len() as u32
        };

        let mut buf = Vec::with_capacity(record_len);
        buf.extend_from_slice(&(record_len as u32).to_le_bytes());
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&value_len_field.to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);
        buf.extend_from_slice(&checksum(&self.key, &self.value).to_le_bytes());
        buf
    }

    /// Decodes a record from the start of `data`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Corrupt`] when the length fields are short,
    ///   inconsistent, or extend past the available bytes
    /// - [`StoreError::ChecksumMismatch`] when the stored CRC does not
    ///   match the key and value bytes
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        if data.len() < Self::MIN_FRAME_SIZE {
            return Err(StoreError::corrupt("frame too short"));
        }

        let record_len = read_u32(data, 0) as usize;
        if record_len < Self::MIN_FRAME_SIZE || data.len() < record_len {
            return Err(StoreError::corrupt("incomplete frame"));
        }

        let key_len = read_u32(data, 4) as usize;
        let value_len_field = read_u32(data, 8);
        let tombstone = value_len_field == Self::TOMBSTONE_LEN;
        let value_len = if tombstone { 0 } else { value_len_field as usize };

        let expected_len = Self::HEADER_SIZE as u64
            + key_len as u64
            + value_len as u64
            + Self::TRAILER_SIZE as u64;
        if record_len as u64 != expected_len {
            return Err(StoreError::corrupt("length fields disagree"));
        }

        let key_start = Self::HEADER_SIZE;
        let value_start = key_start + key_len;
        let key = data[key_start..value_start].to_vec();
        let value = data[value_start..value_start + value_len].to_vec();

        let stored = read_u32(data, record_len - Self::TRAILER_SIZE);
        let actual = checksum(&key, &value);
        if stored != actual {
            return Err(StoreError::ChecksumMismatch {
                expected: stored,
                actual,
            });
        }

        Ok(Self {
            key,
            value,
            tombstone,
        })
    }
}

/// CRC32 over `key ‖ value`.
fn checksum(key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
