//! Key adapters
//!
//! A key adapter turns a user key (plus an optional row id) into the bytes
//! that are sorted and stored. Encoding writes straight into the record span
//! reserved in the buffer, so `encoded_len` must be exact.

use crate::error::{Result, SortError};

/// Pluggable key encoding
pub trait KeyAdapter: Send + Sync {
    /// Exact length `encode` will produce for these inputs
    fn encoded_len(&self, key: &[u8], row_id: Option<&[u8]>) -> usize;

    /// Encode into `dst`, which is exactly `encoded_len` bytes long
    fn encode(&self, dst: &mut [u8], key: &[u8], row_id: Option<&[u8]>);

    /// Recover the user key from an encoded key
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Stores keys unchanged; row ids are ignored
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopKeyAdapter;

impl KeyAdapter for NoopKeyAdapter {
    fn encoded_len(&self, key: &[u8], _row_id: Option<&[u8]>) -> usize {
        key.len()
    }

    fn encode(&self, dst: &mut [u8], key: &[u8], _row_id: Option<&[u8]>) {
        dst.copy_from_slice(key);
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Keeps duplicate keys distinct and ordered
///
/// ```text
/// ┌───────────────────────────┬────────┬──────────────────┐
/// │ memcomparable(key)        │ row id │ row id len (u16) │
/// └───────────────────────────┴────────┴──────────────────┘
/// ```
/// The memcomparable form preserves byte order of the user key, so two rows
/// with the same key sort next to each other, ordered by row id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DupDetectKeyAdapter;

const ROW_ID_LEN_BYTES: usize = 2;

/// Longest row id whose length fits the `u16` trailer
pub const MAX_ROW_ID_LEN: usize = u16::MAX as usize;

impl KeyAdapter for DupDetectKeyAdapter {
    fn encoded_len(&self, key: &[u8], row_id: Option<&[u8]>) -> usize {
        encoded_bytes_len(key.len()) + row_id.map_or(0, <[u8]>::len) + ROW_ID_LEN_BYTES
    }

    fn encode(&self, dst: &mut [u8], key: &[u8], row_id: Option<&[u8]>) {
        let row_id = row_id.unwrap_or_default();
        let key_end = encode_bytes(dst, key);
        let row_end = key_end + row_id.len();
        dst[key_end..row_end].copy_from_slice(row_id);
        dst[row_end..row_end + ROW_ID_LEN_BYTES]
            .copy_from_slice(&(row_id.len() as u16).to_be_bytes());
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < ROW_ID_LEN_BYTES {
            return Err(SortError::Corruption(format!(
                "encoded key too short: {} bytes",
                data.len()
            )));
        }
        let len_at = data.len() - ROW_ID_LEN_BYTES;
        let row_id_len = u16::from_be_bytes([data[len_at], data[len_at + 1]]) as usize;
        if row_id_len > len_at {
            return Err(SortError::Corruption(format!(
                "row id length {} exceeds encoded key",
                row_id_len
            )));
        }
        let (key, consumed) = decode_bytes(&data[..len_at - row_id_len])?;
        if consumed != len_at - row_id_len {
            return Err(SortError::Corruption(
                "trailing bytes after memcomparable key".to_string(),
            ));
        }
        Ok(key)
    }
}

// =============================================================================
// Memcomparable byte encoding
// =============================================================================

const ENC_GROUP_SIZE: usize = 8;
const ENC_MARKER: u8 = 0xFF;
const ENC_PAD: u8 = 0x00;

/// Length of the memcomparable form of an `n`-byte string
pub fn encoded_bytes_len(n: usize) -> usize {
    (n / ENC_GROUP_SIZE + 1) * (ENC_GROUP_SIZE + 1)
}

/// Write the memcomparable form of `data` at the front of `dst`, returning
/// the number of bytes written
fn encode_bytes(dst: &mut [u8], data: &[u8]) -> usize {
    let mut pos = 0;
    let mut idx = 0;
    loop {
        let remain = data.len() - idx;
        let take = remain.min(ENC_GROUP_SIZE);
        let group = &mut dst[pos..pos + ENC_GROUP_SIZE];
        group[..take].copy_from_slice(&data[idx..idx + take]);
        group[take..].fill(ENC_PAD);
        let pad = (ENC_GROUP_SIZE - take) as u8;
        dst[pos + ENC_GROUP_SIZE] = ENC_MARKER - pad;
        pos += ENC_GROUP_SIZE + 1;
        idx += take;
        if pad != 0 {
            return pos;
        }
    }
}

/// Decode a memcomparable string, returning it with the bytes consumed
fn decode_bytes(data: &[u8]) -> Result<(Vec<u8>, usize)> {
    let mut out = Vec::with_capacity(data.len());
    let mut pos = 0;
    loop {
        if data.len() - pos < ENC_GROUP_SIZE + 1 {
            return Err(SortError::Corruption(
                "insufficient bytes to decode memcomparable group".to_string(),
            ));
        }
        let group = &data[pos..pos + ENC_GROUP_SIZE];
        let marker = data[pos + ENC_GROUP_SIZE];
        pos += ENC_GROUP_SIZE + 1;

        let pad = (ENC_MARKER - marker) as usize;
        if pad > ENC_GROUP_SIZE {
            return Err(SortError::Corruption(format!(
                "invalid memcomparable marker {:#04x}",
                marker
            )));
        }
        let real = ENC_GROUP_SIZE - pad;
        out.extend_from_slice(&group[..real]);
        if pad != 0 {
            if group[real..].iter().any(|&b| b != ENC_PAD) {
                return Err(SortError::Corruption(
                    "invalid memcomparable padding".to_string(),
                ));
            }
            return Ok((out, pos));
        }
    }
}
