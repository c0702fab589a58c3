//! Writer Module
//!
//! The external sorted KV writer.
//!
//! ## Responsibilities
//! - Buffer rows in a bounded block arena
//! - Sort and flush a batch as one data file + one statistics file
//! - Keep lifetime min/max/size and per-group overlap statistics
//! - Report a [`WriterSummary`] exactly once on close
//!
//! ## File Layout
//! ```text
//! {prefix}/{writer_id}/{seq}            data file of flush #seq
//! {prefix}/{writer_id}{stat_suffix}/{seq}  range properties of flush #seq
//! ```
//!
//! Files of one writer are each sorted, but no order holds between them; a
//! later merge stage combines them.

mod builder;
mod engine;
mod sorter;

pub use builder::{OnCloseFn, WriterBuilder};
pub use engine::{EngineWriter, KvPair};
pub use sorter::{compare_locations, ParallelSort, SequentialSort, SortConcurrency, SortStrategy};

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::context::Context;
use crate::error::{Result, SortError};
use crate::kv::{KeyAdapter, KeyValueStore, RangePropertiesCollector, MAX_ROW_ID_LEN};
use crate::membuf::{KvLocation, PreAllocKvBuf, LENGTH_BYTES};
use crate::overlap::{get_max_overlapping, Endpoint};
use crate::storage::{join_path, ExternalFileWriter, ExternalStorage, WriterOption};

/// Mutex shared by writers whose flushes must not run concurrently
pub type FlushMutex = Arc<Mutex<()>>;

/// Everything a writer produced over its lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterSummary {
    pub writer_id: String,
    /// Number of flushes that created files
    pub seq: usize,
    /// Smallest encoded key written, inclusive; empty if nothing was written
    pub min: Vec<u8>,
    /// Largest encoded key written, inclusive; empty if nothing was written
    pub max: Vec<u8>,
    /// Sum of `len(key) + len(value)` over all rows
    pub total_size: u64,
    pub multiple_files_stats: Vec<MultipleFilesStat>,
}

impl WriterSummary {
    /// Compact binary form for handing the summary to another stage
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Statistics over a group of flushed file pairs
///
/// Per-file statistics of a large writer may not fit in memory downstream, so
/// files are summarized in groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MultipleFilesStat {
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
    /// `(data file, stat file)` pairs
    pub filenames: Vec<(String, String)>,
    pub max_overlapping_num: i64,
}

impl MultipleFilesStat {
    /// Fill min/max and overlap from each file's first and last key
    pub fn build(&mut self, start_keys: &[Vec<u8>], end_keys: &[Vec<u8>]) {
        let (Some(min_key), Some(max_key)) = (start_keys.iter().min(), end_keys.iter().max()) else {
            return;
        };
        self.min_key = min_key.clone();
        self.max_key = max_key.clone();

        let mut points = Vec::with_capacity(start_keys.len() * 2);
        points.extend(start_keys.iter().map(|k| Endpoint::start(k.clone(), 1)));
        points.extend(end_keys.iter().map(|k| Endpoint::end(k.clone(), 1)));
        self.max_overlapping_num = get_max_overlapping(points);
    }
}

/// Scoped write lock handed out by [`Writer::lock_for_write`]
///
/// Flushes synchronize internally, so holding this guard excludes nothing.
#[must_use]
#[derive(Debug)]
pub struct WriteLock(());

impl WriteLock {
    pub fn release(self) {}
}

/// Writes rows into sorted files on external storage
///
/// ## Concurrency
/// One producer per writer (`&mut self`). Writers may share a [`FlushMutex`],
/// which serializes their flushes and switches sorting to [`ParallelSort`].
pub struct Writer {
    store: Arc<dyn ExternalStorage>,
    writer_id: String,
    current_seq: usize,
    filename_prefix: String,
    stat_prefix: String,
    storage_option: WriterOption,
    key_adapter: Arc<dyn KeyAdapter>,

    rc: RangePropertiesCollector,
    sorter: Box<dyn SortStrategy>,

    kv_buffer: PreAllocKvBuf,
    kv_locations: Vec<KvLocation>,
    /// Raw key + value bytes of the current batch
    kv_size: u64,
    /// Buffered bytes of the current batch, headers included
    batch_size: u64,

    on_close: Option<OnCloseFn>,
    closed: bool,

    // Statistics per group of `multi_file_stat_num` files
    multi_file_stat_num: usize,
    multi_file_stats: Vec<MultipleFilesStat>,
    current_group: MultipleFilesStat,
    file_min_keys: Vec<Vec<u8>>,
    file_max_keys: Vec<Vec<u8>>,

    // Statistics per writer
    min_key: Option<Vec<u8>>,
    max_key: Option<Vec<u8>>,
    total_size: u64,

    share_mu: Option<FlushMutex>,
}

/// Timings of one sort-and-encode pass
struct FlushPass {
    sort_duration: Duration,
    write_start: Instant,
    stat_size: usize,
}

impl Writer {
    /// Buffer one row
    ///
    /// `row_id` only matters when the key adapter keeps duplicates apart and
    /// may be at most [`MAX_ROW_ID_LEN`] bytes.
    /// Flushes first if the buffer is full.
    pub fn write_row(
        &mut self,
        ctx: &Context,
        key: &[u8],
        value: &[u8],
        row_id: Option<&[u8]>,
    ) -> Result<()> {
        if self.closed {
            return Err(SortError::WriterClosed(self.writer_id.clone()));
        }
        if let Some(id) = row_id.filter(|id| id.len() > MAX_ROW_ID_LEN) {
            return Err(SortError::RowIdTooLarge {
                len: id.len(),
                max: MAX_ROW_ID_LEN,
            });
        }

        let encoded_key_len = self.key_adapter.encoded_len(key, row_id);
        let length = encoded_key_len + value.len() + LENGTH_BYTES * 2;

        let loc = match self.kv_buffer.alloc(length) {
            Some(loc) => loc,
            None => {
                self.flush_kvs(ctx, false)?;
                // Records larger than a block are not supported
                self.kv_buffer.alloc(length).ok_or(SortError::RecordTooLarge {
                    len: length,
                    block_size: self.kv_buffer.block_size(),
                })?
            }
        };

        let key_end = LENGTH_BYTES + encoded_key_len;
        let span = self.kv_buffer.record_mut(&loc);
        span[..LENGTH_BYTES].copy_from_slice(&(encoded_key_len as u64).to_be_bytes());
        self.key_adapter
            .encode(&mut span[LENGTH_BYTES..key_end], key, row_id);
        span[key_end..key_end + LENGTH_BYTES].copy_from_slice(&(value.len() as u64).to_be_bytes());
        span[key_end + LENGTH_BYTES..].copy_from_slice(value);

        self.kv_locations.push(loc);
        self.kv_size += (key.len() + value.len()) as u64;
        self.batch_size += length as u64;
        Ok(())
    }

    /// Exclusive-write hook; flushes already synchronize themselves
    pub fn lock_for_write(&self) -> WriteLock {
        WriteLock(())
    }

    /// Sort and persist the buffered batch; no-op when nothing is buffered
    pub fn flush(&mut self, ctx: &Context) -> Result<()> {
        if self.closed {
            return Err(SortError::WriterClosed(self.writer_id.clone()));
        }
        self.flush_kvs(ctx, false)
    }

    /// Flush the last batch, release the buffer and report the summary
    ///
    /// A second call returns [`SortError::WriterClosed`] without touching the
    /// callback.
    pub fn close(&mut self, ctx: &Context) -> Result<()> {
        if self.closed {
            return Err(SortError::WriterClosed(self.writer_id.clone()));
        }
        self.closed = true;

        let flushed = self.flush_kvs(ctx, true);
        self.kv_buffer.destroy();
        flushed?;

        // Files flushed before close with nothing left to flush at close
        if !self.current_group.filenames.is_empty() {
            self.finish_group();
        }

        info!(
            writer_id = %self.writer_id,
            kv_cnt_cap = self.kv_locations.capacity(),
            min_key = %hex::encode(self.min_key.as_deref().unwrap_or_default()),
            max_key = %hex::encode(self.max_key.as_deref().unwrap_or_default()),
            "close writer"
        );

        self.kv_locations = Vec::new();

        let summary = WriterSummary {
            writer_id: self.writer_id.clone(),
            seq: self.current_seq,
            min: self.min_key.take().unwrap_or_default(),
            max: self.max_key.take().unwrap_or_default(),
            total_size: self.total_size,
            multiple_files_stats: std::mem::take(&mut self.multi_file_stats),
        };
        if let Some(on_close) = self.on_close.take() {
            on_close(summary);
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn writer_id(&self) -> &str {
        &self.writer_id
    }

    /// Sequence number the next flush will use
    pub fn current_seq(&self) -> usize {
        self.current_seq
    }

    /// Rows waiting for the next flush
    pub fn buffered_rows(&self) -> usize {
        self.kv_locations.len()
    }

    /// Buffered bytes of the current batch, headers included
    pub fn buffered_bytes(&self) -> u64 {
        self.batch_size
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Name of the sort strategy chosen at build time
    pub fn sort_strategy(&self) -> &'static str {
        self.sorter.name()
    }

    // =========================================================================
    // Flush
    // =========================================================================

    fn flush_kvs(&mut self, ctx: &Context, from_close: bool) -> Result<()> {
        if self.kv_locations.is_empty() {
            return Ok(());
        }

        let share_mu = self.share_mu.clone();
        let _flush_guard = share_mu.as_ref().map(|mu| mu.lock());

        ctx.check()?;
        let (data_file, stat_file, mut data_writer, mut stat_writer) =
            self.create_storage_writer(ctx)?;
        self.current_seq += 1;

        let saved_bytes = self.batch_size;
        let kv_cnt = self.kv_locations.len();
        let start = Instant::now();

        // Both streams are closed whatever happened while writing
        let pass = self.sort_and_write(ctx, data_writer.as_mut(), stat_writer.as_mut());
        let data_closed = data_writer.close(ctx);
        let stat_closed = stat_writer.close(ctx);

        let pass = pass?;
        if let Err(e) = data_closed {
            error!(writer_id = %self.writer_id, path = %data_file, error = %e, "close data writer failed");
            return Err(e);
        }
        if let Err(e) = stat_closed {
            error!(writer_id = %self.writer_id, path = %stat_file, error = %e, "close stat writer failed");
            return Err(e);
        }

        let write_duration = pass.write_start.elapsed();
        let total_duration = start.elapsed();
        info!(
            bytes = saved_bytes,
            kv_cnt,
            stat_size = pass.stat_size,
            sort_time = ?pass.sort_duration,
            write_time = ?write_duration,
            sort_speed_kv_per_sec = per_second(kv_cnt as u64, pass.sort_duration),
            write_speed_bytes_per_sec = per_second(saved_bytes, write_duration),
            sort_and_write_time = ?total_duration,
            writer_id = %self.writer_id,
            "flush kv"
        );

        let min_key = self.kv_buffer.key(&self.kv_locations[0]).to_vec();
        let max_key = self.kv_buffer.key(&self.kv_locations[kv_cnt - 1]).to_vec();
        self.record_min_max(&min_key, &max_key, self.kv_size);

        self.current_group.filenames.push((data_file, stat_file));
        self.file_min_keys.push(min_key);
        self.file_max_keys.push(max_key);
        if from_close || self.current_group.filenames.len() >= self.multi_file_stat_num {
            self.finish_group();
        }

        self.kv_locations.clear();
        self.kv_size = 0;
        self.batch_size = 0;
        self.kv_buffer.reset();
        self.rc.reset();
        Ok(())
    }

    /// Sort the batch, stream it to `data_writer`, then write its properties
    fn sort_and_write(
        &mut self,
        ctx: &Context,
        data_writer: &mut dyn ExternalFileWriter,
        stat_writer: &mut dyn ExternalFileWriter,
    ) -> Result<FlushPass> {
        self.rc.reset();

        let sort_start = Instant::now();
        self.sorter.sort(&mut self.kv_locations, &self.kv_buffer);
        let sort_duration = sort_start.elapsed();

        let write_start = Instant::now();
        let mut kv_store = KeyValueStore::new(ctx, data_writer, &mut self.rc);
        for loc in &self.kv_locations {
            kv_store.add_encoded_data(self.kv_buffer.record(loc))?;
        }
        kv_store.finish();

        let encoded_stat = self.rc.encode();
        stat_writer.write(ctx, &encoded_stat)?;

        Ok(FlushPass {
            sort_duration,
            write_start,
            stat_size: encoded_stat.len(),
        })
    }

    fn create_storage_writer(
        &self,
        ctx: &Context,
    ) -> Result<(
        String,
        String,
        Box<dyn ExternalFileWriter>,
        Box<dyn ExternalFileWriter>,
    )> {
        let seq = self.current_seq.to_string();

        let data_path = join_path(&self.filename_prefix, &seq);
        let mut data_writer = self.store.create(ctx, &data_path, &self.storage_option)?;

        let stat_path = join_path(&self.stat_prefix, &seq);
        let stat_writer = match self.store.create(ctx, &stat_path, &self.storage_option) {
            Ok(w) => w,
            Err(e) => {
                let _ = data_writer.close(ctx);
                return Err(e);
            }
        };

        Ok((data_path, stat_path, data_writer, stat_writer))
    }

    fn record_min_max(&mut self, new_min: &[u8], new_max: &[u8], size: u64) {
        if self.min_key.as_deref().map_or(true, |cur| new_min < cur) {
            self.min_key = Some(new_min.to_vec());
        }
        if self.max_key.as_deref().map_or(true, |cur| new_max > cur) {
            self.max_key = Some(new_max.to_vec());
        }
        self.total_size += size;
    }

    /// Compute the current group's statistics and start a new group
    fn finish_group(&mut self) {
        let mut group = std::mem::take(&mut self.current_group);
        group.build(&self.file_min_keys, &self.file_max_keys);
        self.multi_file_stats.push(group);
        self.current_group.filenames = Vec::with_capacity(self.multi_file_stat_num);
        self.file_min_keys.clear();
        self.file_max_keys.clear();
    }
}

fn per_second(n: u64, dur: Duration) -> f64 {
    let secs = dur.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    n as f64 / secs
}
