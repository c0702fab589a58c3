//! Tests for range properties
//!
//! These tests verify:
//! - Checkpoints are taken on the size distance and on the key distance
//! - Each checkpoint carries the key of the record that completed it
//! - Offset, size and key count are cumulative from the start of the file
//! - A partial trailing range produces no checkpoint
//! - Encode/decode round trip and corruption detection

use globalsort::kv::props::encode_multi_props;
use globalsort::kv::{decode_multi_props, KeyValueStore, RangePropertiesCollector, RangeProperty};
use globalsort::storage::{ExternalStorage, MemStorage, WriterOption};
use globalsort::{Context, SortError};

// =============================================================================
// Helper Functions
// =============================================================================

fn record(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + key.len() + value.len());
    buf.extend_from_slice(&(key.len() as u64).to_be_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(&(value.len() as u64).to_be_bytes());
    buf.extend_from_slice(value);
    buf
}

/// Encode `rows` through a KeyValueStore and return the collected properties
fn collect(rows: &[(&[u8], &[u8])], size_dist: u64, keys_dist: u64) -> Vec<RangeProperty> {
    let ctx = Context::new();
    let store = MemStorage::new();
    let mut writer = store.create(&ctx, "data/0", &WriterOption::default()).unwrap();
    let mut rc = RangePropertiesCollector::new(size_dist, keys_dist);

    let mut kv_store = KeyValueStore::new(&ctx, writer.as_mut(), &mut rc);
    for (key, value) in rows {
        kv_store.add_encoded_data(&record(key, value)).unwrap();
    }
    kv_store.finish();
    writer.close(&ctx).unwrap();

    rc.props().to_vec()
}

// =============================================================================
// Collector Tests
// =============================================================================

#[test]
fn test_cut_on_keys_distance() {
    let rows: Vec<(&[u8], &[u8])> = vec![
        (b"a", b"1"),
        (b"b", b"2"),
        (b"c", b"3"),
        (b"d", b"4"),
        (b"e", b"5"),
    ];

    let props = collect(&rows, u64::MAX, 2);

    // Each record is 16 + 1 + 1 = 18 bytes
    assert_eq!(
        props,
        vec![
            RangeProperty { key: b"b".to_vec(), offset: 36, size: 4, keys: 2 },
            RangeProperty { key: b"d".to_vec(), offset: 72, size: 8, keys: 4 },
        ]
    );
}

#[test]
fn test_cut_on_size_distance() {
    let rows: Vec<(&[u8], &[u8])> = vec![
        (b"k1", b"vvvvvvvv"),
        (b"k2", b"vvvvvvvv"),
        (b"k3", b"v"),
    ];

    // Each of the first two rows is 10 bytes of key + value
    let props = collect(&rows, 10, u64::MAX);

    assert_eq!(props.len(), 2);
    assert_eq!(props[0].key, b"k1");
    assert_eq!(props[0].size, 10);
    assert_eq!(props[1].key, b"k2");
    assert_eq!(props[1].size, 20);
    assert_eq!(props[1].keys, 2);
}

#[test]
fn test_offsets_are_cumulative() {
    let rows: Vec<(&[u8], &[u8])> = vec![(b"aa", b"x"), (b"bb", b"y"), (b"cc", b"z")];

    let props = collect(&rows, u64::MAX, 1);

    // Each record is 16 + 2 + 1 = 19 bytes
    let offsets: Vec<u64> = props.iter().map(|p| p.offset).collect();
    assert_eq!(offsets, vec![19, 38, 57]);
    let keys: Vec<u64> = props.iter().map(|p| p.keys).collect();
    assert_eq!(keys, vec![1, 2, 3]);
    assert_eq!(props[2].key, b"cc");
}

#[test]
fn test_distance_counts_from_last_checkpoint() {
    let rows: Vec<(&[u8], &[u8])> = vec![
        (b"a", b"123456789"),
        (b"b", b"1"),
        (b"c", b"1"),
        (b"d", b"1"),
    ];

    // The size distance fires on "a"; the key distance then needs 3 more rows
    let props = collect(&rows, 10, 3);

    assert_eq!(props.len(), 2);
    assert_eq!((props[0].key.as_slice(), props[0].keys, props[0].size), (&b"a"[..], 1, 10));
    assert_eq!((props[1].key.as_slice(), props[1].keys, props[1].size), (&b"d"[..], 4, 16));
}

#[test]
fn test_no_checkpoint_below_thresholds() {
    let rows: Vec<(&[u8], &[u8])> = vec![(b"a", b"1"), (b"b", b"22")];

    let props = collect(&rows, 1024, 1024);

    assert!(props.is_empty());
}

#[test]
fn test_no_records_no_properties() {
    let props = collect(&[], 10, 10);
    assert!(props.is_empty());
}

#[test]
fn test_reset_clears_properties() {
    let mut rc = RangePropertiesCollector::new(1, 1);
    let ctx = Context::new();
    let store = MemStorage::new();
    let mut writer = store.create(&ctx, "data/0", &WriterOption::default()).unwrap();

    let mut kv_store = KeyValueStore::new(&ctx, writer.as_mut(), &mut rc);
    kv_store.add_encoded_data(&record(b"a", b"1")).unwrap();
    kv_store.finish();
    assert_eq!(rc.props().len(), 1);

    rc.reset();
    assert!(rc.props().is_empty());
    assert!(rc.encode().is_empty());
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_decode_round_trip() {
    let props = vec![
        RangeProperty { key: b"alpha".to_vec(), offset: 0, size: 1024, keys: 8 },
        RangeProperty { key: Vec::new(), offset: 4096, size: 7, keys: 1 },
        RangeProperty { key: vec![0xff; 300], offset: u64::MAX, size: 3, keys: 2 },
    ];

    let mut buf = Vec::new();
    encode_multi_props(&mut buf, &props);

    assert_eq!(decode_multi_props(&buf).unwrap(), props);
}

#[test]
fn test_encoded_layout() {
    let props = vec![RangeProperty { key: b"k".to_vec(), offset: 3, size: 1, keys: 2 }];

    let mut buf = Vec::new();
    encode_multi_props(&mut buf, &props);

    assert_eq!(buf.len(), 4 + 4 + 1 + 24);
    assert_eq!(&buf[..4], &29u32.to_be_bytes());
    assert_eq!(&buf[4..8], &1u32.to_be_bytes());
    assert_eq!(buf[8], b'k');
    assert_eq!(&buf[9..17], &1u64.to_be_bytes());
    assert_eq!(&buf[17..25], &2u64.to_be_bytes());
    assert_eq!(&buf[25..33], &3u64.to_be_bytes());
}

#[test]
fn test_collector_encode_matches_collected() {
    let keys: Vec<Vec<u8>> = (0..50u8).map(|i| vec![i]).collect();

    let ctx = Context::new();
    let store = MemStorage::new();
    let mut writer = store.create(&ctx, "data/0", &WriterOption::default()).unwrap();
    let mut rc = RangePropertiesCollector::new(40, 7);
    let mut kv_store = KeyValueStore::new(&ctx, writer.as_mut(), &mut rc);
    for key in &keys {
        kv_store.add_encoded_data(&record(key, b"value")).unwrap();
    }
    kv_store.finish();

    let decoded = decode_multi_props(&rc.encode()).unwrap();
    assert_eq!(decoded, rc.props());
    // Every seventh record (42 bytes) completes a range
    assert_eq!(decoded.len(), 7);
    assert!(decoded.iter().enumerate().all(|(i, p)| p.keys == 7 * (i as u64 + 1)));
    assert_eq!(decoded[0].key, vec![6u8]);
}

#[test]
fn test_decode_rejects_truncated_input() {
    let props = vec![RangeProperty { key: b"key".to_vec(), offset: 1, size: 2, keys: 3 }];
    let mut buf = Vec::new();
    encode_multi_props(&mut buf, &props);

    for cut in [1, 3, 10, buf.len() - 1] {
        assert!(matches!(
            decode_multi_props(&buf[..cut]),
            Err(SortError::Corruption(_))
        ));
    }
}

#[test]
fn test_decode_rejects_inconsistent_key_length() {
    let props = vec![RangeProperty { key: b"key".to_vec(), offset: 1, size: 2, keys: 3 }];
    let mut buf = Vec::new();
    encode_multi_props(&mut buf, &props);
    buf[4..8].copy_from_slice(&9u32.to_be_bytes());

    assert!(matches!(decode_multi_props(&buf), Err(SortError::Corruption(_))));
}
