//! Range properties
//!
//! A range property is a sparse checkpoint over one data file. The collector
//! snapshots its cumulative offset, size and key count every `prop_size_dist`
//! bytes or `prop_keys_dist` keys, whichever comes first, so a reader can seek
//! to roughly the right offset without a full index.
//!
//! ## Encoding
//! ```text
//! ┌──────────────┬─────────────────┬─────┬───────────┬───────────┬─────────────┐
//! │ Len: u32 (BE)│ KeyLen: u32 (BE)│ Key │ Size: u64 │ Keys: u64 │ Offset: u64 │
//! └──────────────┴─────────────────┴─────┴───────────┴───────────┴─────────────┘
//! ... repeated for each property; Len covers everything after itself ...
//! ```

use bytes::{Buf, BufMut};

use crate::error::{Result, SortError};

/// Bytes of an encoded property body excluding its key
const PROPERTY_LEN_EXCEPT_KEY: usize = 4 + 8 * 3;

/// Checkpoint taken after the record named by `key`
///
/// All counters are cumulative from the start of the data file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeProperty {
    /// Key of the record that completed this range
    pub key: Vec<u8>,
    /// Bytes of the data file written up to and including that record
    pub offset: u64,
    /// Sum of key and value lengths written so far
    pub size: u64,
    /// Number of records written so far
    pub keys: u64,
}

/// Collects range properties for one flush
pub struct RangePropertiesCollector {
    props: Vec<RangeProperty>,
    /// Running totals since the start of the file
    total: RangeProperty,
    /// Size and key count since the last checkpoint
    pending_size: u64,
    pending_keys: u64,
    prop_size_dist: u64,
    prop_keys_dist: u64,
}

impl RangePropertiesCollector {
    pub fn new(prop_size_dist: u64, prop_keys_dist: u64) -> Self {
        Self {
            props: Vec::with_capacity(1024),
            total: RangeProperty::default(),
            pending_size: 0,
            pending_keys: 0,
            prop_size_dist,
            prop_keys_dist,
        }
    }

    /// Account one record of `size` key+value bytes ending at `end_offset`
    ///
    /// A checkpoint is taken once the bytes or keys since the previous one
    /// reach their distance.
    pub(crate) fn on_record(&mut self, key: &[u8], size: u64, end_offset: u64) {
        self.total.size += size;
        self.total.keys += 1;
        self.total.offset = end_offset;
        self.pending_size += size;
        self.pending_keys += 1;

        if self.pending_size >= self.prop_size_dist || self.pending_keys >= self.prop_keys_dist {
            self.props.push(RangeProperty {
                key: key.to_vec(),
                offset: self.total.offset,
                size: self.total.size,
                keys: self.total.keys,
            });
            self.pending_size = 0;
            self.pending_keys = 0;
        }
    }

    /// Properties collected so far
    pub fn props(&self) -> &[RangeProperty] {
        &self.props
    }

    /// Serialize all collected properties
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1024);
        encode_multi_props(&mut buf, &self.props);
        buf
    }

    /// Clear state for the next flush
    pub fn reset(&mut self) {
        self.props.clear();
        self.total = RangeProperty::default();
        self.pending_size = 0;
        self.pending_keys = 0;
    }
}

/// Append the encoding of `props` to `buf`
pub fn encode_multi_props(buf: &mut Vec<u8>, props: &[RangeProperty]) {
    for prop in props {
        buf.put_u32((PROPERTY_LEN_EXCEPT_KEY + prop.key.len()) as u32);
        buf.put_u32(prop.key.len() as u32);
        buf.put_slice(&prop.key);
        buf.put_u64(prop.size);
        buf.put_u64(prop.keys);
        buf.put_u64(prop.offset);
    }
}

/// Parse a statistics file produced by [`RangePropertiesCollector::encode`]
pub fn decode_multi_props(mut data: &[u8]) -> Result<Vec<RangeProperty>> {
    let mut props = Vec::new();
    while data.has_remaining() {
        if data.remaining() < 4 {
            return Err(SortError::Corruption(format!(
                "truncated property length: {} bytes left",
                data.remaining()
            )));
        }
        let len = data.get_u32() as usize;
        if len < PROPERTY_LEN_EXCEPT_KEY || data.remaining() < len {
            return Err(SortError::Corruption(format!(
                "invalid property length {} with {} bytes left",
                len,
                data.remaining()
            )));
        }

        let mut body = &data[..len];
        data.advance(len);

        let key_len = body.get_u32() as usize;
        if key_len + PROPERTY_LEN_EXCEPT_KEY != len {
            return Err(SortError::Corruption(format!(
                "property key length {} does not match property length {}",
                key_len, len
            )));
        }
        let key = body[..key_len].to_vec();
        body.advance(key_len);
        let size = body.get_u64();
        let keys = body.get_u64();
        let offset = body.get_u64();

        props.push(RangeProperty {
            key,
            offset,
            size,
            keys,
        });
    }
    Ok(props)
}
