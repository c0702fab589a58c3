//! Tests for key adapters
//!
//! These tests verify:
//! - The plain adapter stores keys unchanged
//! - The duplicate-detecting adapter is exact about its length
//! - Its encoding preserves key order and keeps duplicates distinct
//! - Decoding recovers the user key and rejects garbage

use globalsort::kv::key_adapter::encoded_bytes_len;
use globalsort::kv::{DupDetectKeyAdapter, KeyAdapter, NoopKeyAdapter};
use globalsort::SortError;

// =============================================================================
// Helper Functions
// =============================================================================

fn encode(adapter: &dyn KeyAdapter, key: &[u8], row_id: Option<&[u8]>) -> Vec<u8> {
    let mut dst = vec![0u8; adapter.encoded_len(key, row_id)];
    adapter.encode(&mut dst, key, row_id);
    dst
}

// =============================================================================
// NoopKeyAdapter Tests
// =============================================================================

#[test]
fn test_noop_is_identity() {
    let adapter = NoopKeyAdapter;

    assert_eq!(adapter.encoded_len(b"abc", Some(b"row")), 3);
    assert_eq!(encode(&adapter, b"abc", Some(b"row")), b"abc");
    assert_eq!(adapter.decode(b"abc").unwrap(), b"abc");
}

// =============================================================================
// DupDetectKeyAdapter Tests
// =============================================================================

#[test]
fn test_encoded_bytes_len_groups() {
    assert_eq!(encoded_bytes_len(0), 9);
    assert_eq!(encoded_bytes_len(7), 9);
    assert_eq!(encoded_bytes_len(8), 18);
    assert_eq!(encoded_bytes_len(17), 27);
}

#[test]
fn test_dup_detect_known_encoding() {
    let adapter = DupDetectKeyAdapter;

    let encoded = encode(&adapter, b"abc", Some(&[0x01]));

    let mut expected = b"abc".to_vec();
    expected.extend_from_slice(&[0, 0, 0, 0, 0]);
    expected.push(0xFF - 5);
    expected.push(0x01);
    expected.extend_from_slice(&[0x00, 0x01]);
    assert_eq!(encoded, expected);
}

#[test]
fn test_dup_detect_full_group_gets_terminator() {
    let adapter = DupDetectKeyAdapter;

    let encoded = encode(&adapter, b"12345678", None);

    assert_eq!(encoded.len(), 18 + 2);
    assert_eq!(encoded[8], 0xFF);
    assert_eq!(&encoded[9..17], &[0u8; 8]);
    assert_eq!(encoded[17], 0xFF - 8);
}

#[test]
fn test_dup_detect_length_is_exact() {
    let adapter = DupDetectKeyAdapter;

    for key_len in 0..20 {
        let key = vec![b'k'; key_len];
        for row_id in [None, Some(&b"r"[..]), Some(&b"row-id-1234"[..])] {
            let encoded = encode(&adapter, &key, row_id);
            assert_eq!(encoded.len(), adapter.encoded_len(&key, row_id));
        }
    }
}

#[test]
fn test_dup_detect_decode_recovers_key() {
    let adapter = DupDetectKeyAdapter;

    let keys: [&[u8]; 5] = [b"", b"a", b"abcdefgh", b"abcdefghi", b"\x00\xff\x00"];

    for key in keys {
        let encoded = encode(&adapter, key, Some(b"rowid"));
        assert_eq!(adapter.decode(&encoded).unwrap(), key);
    }
}

#[test]
fn test_dup_detect_preserves_key_order() {
    let adapter = DupDetectKeyAdapter;
    let keys: [&[u8]; 6] = [b"", b"a", b"a\x00", b"ab", b"abcdefgh", b"abcdefgh\x00"];

    let encoded: Vec<Vec<u8>> = keys.iter().map(|k| encode(&adapter, k, Some(b"z"))).collect();

    for pair in encoded.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn test_dup_detect_same_key_different_rows() {
    let adapter = DupDetectKeyAdapter;

    let first = encode(&adapter, b"dup", Some(&1u64.to_be_bytes()));
    let second = encode(&adapter, b"dup", Some(&2u64.to_be_bytes()));

    assert_ne!(first, second);
    assert!(first < second);
    assert_eq!(adapter.decode(&first).unwrap(), adapter.decode(&second).unwrap());
}

#[test]
fn test_dup_detect_decode_rejects_short_input() {
    let adapter = DupDetectKeyAdapter;

    assert!(matches!(adapter.decode(&[0x01]), Err(SortError::Corruption(_))));
}

#[test]
fn test_dup_detect_decode_rejects_bad_row_id_length() {
    let adapter = DupDetectKeyAdapter;

    assert!(matches!(
        adapter.decode(&[0x00, 0x00, 0x00, 0x40]),
        Err(SortError::Corruption(_))
    ));
}

#[test]
fn test_dup_detect_decode_rejects_bad_marker() {
    let adapter = DupDetectKeyAdapter;
    let mut encoded = encode(&adapter, b"abc", None);
    encoded[8] = 0x10;

    assert!(matches!(adapter.decode(&encoded), Err(SortError::Corruption(_))));
}
