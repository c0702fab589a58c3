//! Key-value store encoder and reader
//!
//! `KeyValueStore` streams sorted records into a data file and drives the
//! range properties collector. `KvReader` walks a data file back.

use crate::context::Context;
use crate::error::{Result, SortError};
use crate::membuf::LENGTH_BYTES;
use crate::storage::ExternalFileWriter;

use super::props::RangePropertiesCollector;

/// Single-pass encoder for one data file
pub struct KeyValueStore<'a> {
    ctx: &'a Context,
    writer: &'a mut dyn ExternalFileWriter,
    rc: &'a mut RangePropertiesCollector,
    /// Bytes written to the data file so far
    offset: u64,
    /// Records written so far
    entry_count: u64,
}

impl<'a> KeyValueStore<'a> {
    /// Start encoding into `writer`; `rc` must have been reset
    pub fn new(
        ctx: &'a Context,
        writer: &'a mut dyn ExternalFileWriter,
        rc: &'a mut RangePropertiesCollector,
    ) -> Self {
        Self {
            ctx,
            writer,
            rc,
            offset: 0,
            entry_count: 0,
        }
    }

    /// Append one already-encoded record (`[keyLen][key][valLen][val]`)
    ///
    /// Records must arrive in non-decreasing key order.
    pub fn add_encoded_data(&mut self, record: &[u8]) -> Result<()> {
        self.ctx.check()?;
        let (key, value) = split_record(record)?;

        self.writer.write(self.ctx, record)?;

        self.offset += record.len() as u64;
        self.entry_count += 1;
        self.rc.on_record(key, (key.len() + value.len()) as u64, self.offset);
        Ok(())
    }

    /// Finish encoding, returning the bytes written
    pub fn finish(self) -> u64 {
        self.offset
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}

/// Iterator over the `(encoded_key, value)` pairs of a data file
pub struct KvReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> KvReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for KvReader<'a> {
    type Item = Result<(&'a [u8], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        match record_len(rest).and_then(|len| split_record(&rest[..len]).map(|kv| (kv, len))) {
            Ok((kv, len)) => {
                self.pos += len;
                Some(Ok(kv))
            }
            Err(e) => {
                // Stop after the first corrupt record
                self.pos = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// Split a full record into its key and value
fn split_record(record: &[u8]) -> Result<(&[u8], &[u8])> {
    let key_len = read_header(record, 0)?;
    let key_end = LENGTH_BYTES.saturating_add(key_len);
    let val_len = read_header(record, key_end)?;
    let val_start = key_end + LENGTH_BYTES;
    if record.len() != val_start.saturating_add(val_len) {
        return Err(SortError::Corruption(format!(
            "record length {} does not match headers (key {}, value {})",
            record.len(),
            key_len,
            val_len
        )));
    }
    Ok((&record[LENGTH_BYTES..key_end], &record[val_start..]))
}

/// Length of the record at the front of `data`
fn record_len(data: &[u8]) -> Result<usize> {
    let key_len = read_header(data, 0)?;
    let val_len = read_header(data, LENGTH_BYTES.saturating_add(key_len))?;
    let len = (2 * LENGTH_BYTES + key_len).saturating_add(val_len);
    if len > data.len() {
        return Err(SortError::Corruption(format!(
            "truncated record: need {} bytes, {} left",
            len,
            data.len()
        )));
    }
    Ok(len)
}

fn read_header(data: &[u8], at: usize) -> Result<usize> {
    let end = at
        .checked_add(LENGTH_BYTES)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| SortError::Corruption(format!("truncated length header at {}", at)))?;
    let mut header = [0u8; LENGTH_BYTES];
    header.copy_from_slice(&data[at..end]);
    Ok(u64::from_be_bytes(header) as usize)
}
