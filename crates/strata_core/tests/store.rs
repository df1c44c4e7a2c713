//! End-to-end store scenarios: rollover, compaction, persistence,
//! corruption detection and delete semantics.
//!
//! Record frames are 16 bytes of framing plus key and value, so the
//! 1-byte-key / 2-byte-value pairs used here encode to 19 bytes each.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::time::Duration;
use strata_core::{Config, Store, StoreError};
use tempfile::tempdir;

/// Compaction disabled: segment counts stay deterministic.
fn quiet_config() -> Config {
    Config::default().compaction_interval(Duration::ZERO)
}

#[test]
fn put_get_round_trip() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), quiet_config().max_segment_size(45)).unwrap();

    let pairs = [("1", "v1"), ("2", "v2"), ("3", "v3")];
    for (key, value) in pairs {
        store.put(key.as_bytes(), value.as_bytes()).unwrap();
        assert_eq!(store.get(key.as_bytes()).unwrap(), value.as_bytes());
    }

    // Re-read after all writes: rollover must not lose anything.
    for (key, value) in pairs {
        assert_eq!(store.get(key.as_bytes()).unwrap(), value.as_bytes());
    }
}

#[test]
fn empty_value_round_trips() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), quiet_config()).unwrap();

    store.put(b"empty", b"").unwrap();
    assert_eq!(store.get(b"empty").unwrap(), Vec::<u8>::new());
}

#[test]
fn segment_rollover_and_compaction() {
    let dir = tempdir().unwrap();
    let config = Config::default().max_segment_size(45);
    let store = Store::open(dir.path(), config).unwrap();

    store.put(b"1", b"v1").unwrap();
    store.put(b"2", b"v2").unwrap();
    store.put(b"3", b"v3").unwrap();
    store.put(b"2", b"v5").unwrap();
    assert_eq!(store.segment_count(), 2);

    store.put(b"4", b"v4").unwrap();
    assert_eq!(store.segment_count(), 3);

    // The compactor ticks every 500ms; two seconds is plenty.
    std::thread::sleep(Duration::from_secs(2));
    assert_eq!(store.segment_count(), 2);

    // The overwrite survives the merge.
    assert_eq!(store.get(b"2").unwrap(), b"v5");
    assert_eq!(store.get(b"1").unwrap(), b"v1");
    assert_eq!(store.get(b"3").unwrap(), b"v3");
    assert_eq!(store.get(b"4").unwrap(), b"v4");

    // Merged output took over the newest sealed ordinal and holds the
    // three surviving 19-byte records.
    let merged = dir.path().join("seg-000001");
    assert_eq!(std::fs::metadata(&merged).unwrap().len(), 57);
    assert!(!dir.path().join("seg-000000").exists());
}

#[test]
fn sealed_file_stops_growing() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), quiet_config().max_segment_size(45)).unwrap();

    let pairs = [("1", "v1"), ("2", "v2"), ("3", "v3")];
    for (key, value) in pairs {
        store.put(key.as_bytes(), value.as_bytes()).unwrap();
    }

    let sealed = dir.path().join("seg-000000");
    let size_after_first_round = std::fs::metadata(&sealed).unwrap().len();

    // Identical writes land in the active segment and roll over; the
    // sealed file must not grow.
    for (key, value) in pairs {
        store.put(key.as_bytes(), value.as_bytes()).unwrap();
    }

    assert_eq!(
        std::fs::metadata(&sealed).unwrap().len(),
        size_after_first_round
    );
}

#[test]
fn reopen_preserves_data() {
    let dir = tempdir().unwrap();
    let pairs = [("1", "v1"), ("2", "v2"), ("3", "v3")];

    {
        let store = Store::open(dir.path(), quiet_config().max_segment_size(45)).unwrap();
        for (key, value) in pairs {
            store.put(key.as_bytes(), value.as_bytes()).unwrap();
        }
        store.close().unwrap();
    }

    let store = Store::open(dir.path(), quiet_config().max_segment_size(45)).unwrap();
    for (key, value) in pairs {
        assert_eq!(store.get(key.as_bytes()).unwrap(), value.as_bytes());
    }
}

#[test]
fn corrupted_value_fails_checksum() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), quiet_config().max_segment_size(150)).unwrap();

    store.put(b"key1", b"value1").unwrap();
    store.put(b"key2", b"value2").unwrap();
    store.put(b"key3", b"value3").unwrap();

    assert_eq!(store.get(b"key1").unwrap(), b"value1");

    // key1 is the first record; its value starts after the 12-byte
    // header and the 4-byte key.
    let segment = dir.path().join("seg-000000");
    let mut file = OpenOptions::new().write(true).open(&segment).unwrap();
    file.seek(SeekFrom::Start(12 + b"key1".len() as u64)).unwrap();
    file.write_all(b"corupt").unwrap();
    file.sync_all().unwrap();

    assert!(matches!(
        store.get(b"key1"),
        Err(StoreError::ChecksumMismatch { .. })
    ));

    // Other records are untouched.
    assert_eq!(store.get(b"key2").unwrap(), b"value2");
    assert_eq!(store.get(b"key3").unwrap(), b"value3");
}

#[test]
fn delete_hides_key() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path(), quiet_config()).unwrap();

    store.put(b"key1", b"value1").unwrap();
    store.put(b"key2", b"value2").unwrap();
    store.delete(b"key2").unwrap();

    assert!(matches!(store.get(b"key2"), Err(StoreError::NotFound)));
    assert_eq!(store.get(b"key1").unwrap(), b"value1");

    // Deleting an absent key is a no-op.
    store.delete(b"key4").unwrap();
    assert!(matches!(store.get(b"key4"), Err(StoreError::NotFound)));

    // A fresh put resurrects the key.
    store.put(b"key2", b"value5").unwrap();
    assert_eq!(store.get(b"key2").unwrap(), b"value5");
}

#[test]
fn delete_survives_reopen() {
    let dir = tempdir().unwrap();

    {
        let store = Store::open(dir.path(), quiet_config()).unwrap();
        store.put(b"key", b"value").unwrap();
        store.delete(b"key").unwrap();
        store.close().unwrap();
    }

    let store = Store::open(dir.path(), quiet_config()).unwrap();
    assert!(matches!(store.get(b"key"), Err(StoreError::NotFound)));
}

#[test]
fn compaction_preserves_deletes() {
    let dir = tempdir().unwrap();
    let config = Config::default().max_segment_size(45);
    let store = Store::open(dir.path(), config).unwrap();

    store.put(b"a", b"v1").unwrap();
    store.put(b"b", b"v2").unwrap();
    store.put(b"c", b"v3").unwrap();
    store.delete(b"a").unwrap();
    store.put(b"d", b"v4").unwrap();
    assert_eq!(store.segment_count(), 3);

    std::thread::sleep(Duration::from_secs(2));
    assert_eq!(store.segment_count(), 2);

    assert!(matches!(store.get(b"a"), Err(StoreError::NotFound)));
    assert_eq!(store.get(b"b").unwrap(), b"v2");
    assert_eq!(store.get(b"c").unwrap(), b"v3");
    assert_eq!(store.get(b"d").unwrap(), b"v4");
}

#[test]
fn frame_past_eof_fails_open() {
    let dir = tempdir().unwrap();
    let segment = dir.path().join("seg-000000");

    // A header claiming a 100-byte frame in a 12-byte file.
    let mut frame = Vec::new();
    frame.extend_from_slice(&100u32.to_le_bytes());
    frame.extend_from_slice(&2u32.to_le_bytes());
    frame.extend_from_slice(&78u32.to_le_bytes());
    std::fs::write(&segment, &frame).unwrap();

    let result = Store::open(dir.path(), quiet_config());
    assert!(matches!(result, Err(StoreError::Corrupt { .. })));
}

#[test]
fn second_open_is_locked() {
    let dir = tempdir().unwrap();
    let _store = Store::open(dir.path(), quiet_config()).unwrap();

    let result = Store::open(dir.path(), quiet_config());
    assert!(matches!(result, Err(StoreError::Locked)));
}
