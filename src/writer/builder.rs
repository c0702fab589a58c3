//! Writer builder
//!
//! Chained configuration producing [`Writer`]s bound to a storage prefix.
//! One builder may build many writers; they share its pool, mutex, callback
//! and sort budget.

use std::sync::Arc;

use crossbeam::channel::Sender;
use tracing::debug;

use crate::config::WriterConfig;
use crate::error::Result;
use crate::kv::{DupDetectKeyAdapter, KeyAdapter, NoopKeyAdapter, RangePropertiesCollector};
use crate::membuf::{Pool, PreAllocKvBuf};
use crate::storage::{join_path, ExternalStorage, WriterOption};

use super::sorter::{ParallelSort, SequentialSort, SortConcurrency, SortStrategy};
use super::{FlushMutex, MultipleFilesStat, Writer, WriterSummary};

/// Callback receiving a writer's summary when it closes
pub type OnCloseFn = Arc<dyn Fn(WriterSummary) + Send + Sync>;

/// Builder for [`Writer`]
pub struct WriterBuilder {
    config: WriterConfig,
    on_close: Option<OnCloseFn>,
    key_adapter: Option<Arc<dyn KeyAdapter>>,
    buffer_pool: Option<Arc<Pool>>,
    mutex: Option<FlushMutex>,
    sort_concurrency: SortConcurrency,
}

impl Default for WriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterBuilder {
    /// Builder with default configuration
    pub fn new() -> Self {
        Self::with_config(WriterConfig::default())
    }

    /// Builder starting from an explicit configuration
    pub fn with_config(config: WriterConfig) -> Self {
        Self {
            config,
            on_close: None,
            key_adapter: None,
            buffer_pool: None,
            mutex: None,
            sort_concurrency: SortConcurrency::default(),
        }
    }

    /// Flush once buffered records (headers included) would exceed `size` bytes
    pub fn memory_size_limit(mut self, size: u64) -> Self {
        self.config.mem_size_limit = size;
        self
    }

    /// Set the size of each pre-allocated block (largest record accepted)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the expected rows per batch (initial location list capacity)
    pub fn write_batch_count(mut self, count: u64) -> Self {
        self.config.write_batch_count = count;
        self
    }

    /// Set the byte distance between range properties
    pub fn prop_size_distance(mut self, dist: u64) -> Self {
        self.config.prop_size_dist = dist;
        self
    }

    /// Set the key-count distance between range properties
    pub fn prop_keys_distance(mut self, dist: u64) -> Self {
        self.config.prop_keys_dist = dist;
        self
    }

    /// Set the number of flushes summarized by one `MultipleFilesStat`
    pub fn multi_file_stat_num(mut self, num: usize) -> Self {
        self.config.multi_file_stat_num = num;
        self
    }

    /// Set the concurrency hint passed to storage on create
    pub fn storage_concurrency(mut self, concurrency: usize) -> Self {
        self.config.storage_concurrency = concurrency;
        self
    }

    /// Set the directory suffix of statistics files
    pub fn stat_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.stat_suffix = suffix.into();
        self
    }

    /// Set the hard cap on parallel sort workers
    pub fn max_sort_workers(mut self, workers: usize) -> Self {
        self.config.max_sort_workers = workers;
        self
    }

    /// Call `f` with the summary of every writer built here, once per writer
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(WriterSummary) + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// Deliver summaries on a channel instead of a callback
    pub fn on_close_sender(self, tx: Sender<WriterSummary>) -> Self {
        self.on_close(move |summary| {
            // A dropped receiver only means nobody is waiting for summaries
            let _ = tx.send(summary);
        })
    }

    /// Toggle the duplicate-detecting key encoding
    pub fn key_duplication_encoding(mut self, enabled: bool) -> Self {
        self.config.key_dupe_encoding = enabled;
        self
    }

    /// Use a custom key adapter; overrides `key_duplication_encoding`
    pub fn key_adapter(mut self, adapter: Arc<dyn KeyAdapter>) -> Self {
        self.key_adapter = Some(adapter);
        self
    }

    /// Share a block pool between writers
    pub fn buffer_pool(mut self, pool: Arc<Pool>) -> Self {
        self.buffer_pool = Some(pool);
        self
    }

    /// Serialize flushes with other writers holding the same mutex
    ///
    /// Writers with a shared mutex sort in parallel.
    pub fn mutex(mut self, mu: FlushMutex) -> Self {
        self.mutex = Some(mu);
        self
    }

    /// Share a live worker budget for the parallel sort
    pub fn sort_concurrency(mut self, budget: SortConcurrency) -> Self {
        self.sort_concurrency = budget;
        self
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Build a writer whose files live under `{prefix}/{writer_id}`
    pub fn build(
        &self,
        store: Arc<dyn ExternalStorage>,
        prefix: &str,
        writer_id: &str,
    ) -> Result<Writer> {
        self.config.validate()?;

        let pool = self
            .buffer_pool
            .clone()
            .unwrap_or_else(|| Arc::new(Pool::new()));
        let key_adapter: Arc<dyn KeyAdapter> = match &self.key_adapter {
            Some(adapter) => Arc::clone(adapter),
            None if self.config.key_dupe_encoding => Arc::new(DupDetectKeyAdapter),
            None => Arc::new(NoopKeyAdapter),
        };
        let sorter: Box<dyn SortStrategy> = match &self.mutex {
            Some(_) => Box::new(ParallelSort::new(
                self.sort_concurrency.clone(),
                self.config.max_sort_workers,
            )),
            None => Box::new(SequentialSort),
        };

        let filename_prefix = join_path(prefix, writer_id);
        let stat_prefix = format!("{}{}", filename_prefix, self.config.stat_suffix);
        let group_cap = self.config.multi_file_stat_num;

        debug!(
            writer_id,
            prefix = %filename_prefix,
            mem_size_limit = self.config.mem_size_limit,
            block_size = self.config.block_size,
            sort = sorter.name(),
            "build writer"
        );

        Ok(Writer {
            store,
            writer_id: writer_id.to_string(),
            current_seq: 0,
            filename_prefix,
            stat_prefix,
            storage_option: WriterOption {
                concurrency: self.config.storage_concurrency,
            },
            key_adapter,
            rc: RangePropertiesCollector::new(
                self.config.prop_size_dist,
                self.config.prop_keys_dist,
            ),
            sorter,
            kv_buffer: PreAllocKvBuf::new(pool, self.config.block_size, self.config.max_blocks()),
            kv_locations: Vec::with_capacity(self.config.write_batch_count as usize),
            kv_size: 0,
            batch_size: 0,
            on_close: self.on_close.clone(),
            closed: false,
            multi_file_stat_num: group_cap,
            multi_file_stats: Vec::new(),
            current_group: MultipleFilesStat {
                filenames: Vec::with_capacity(group_cap),
                ..Default::default()
            },
            file_min_keys: Vec::with_capacity(group_cap),
            file_max_keys: Vec::with_capacity(group_cap),
            min_key: None,
            max_key: None,
            total_size: 0,
            share_mu: self.mutex.clone(),
        })
    }
}
