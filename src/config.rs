//! Configuration for globalsort writers
//!
//! Centralized tuning knobs with sensible defaults. Every value that used to be
//! a process-wide constant in older global-sort designs lives here and is
//! threaded through [`WriterBuilder`](crate::writer::WriterBuilder).

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;

/// Default memory budget of one writer before it flushes (256 MiB)
pub const DEFAULT_MEM_SIZE_LIMIT: u64 = 256 * MB;

/// Default size of one pre-allocated buffer block (16 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 16 * MB as usize;

/// Default capacity hint for the per-batch location list
pub const DEFAULT_WRITE_BATCH_COUNT: u64 = 8 * KB;

/// Default byte distance between two range properties (1 MiB)
pub const DEFAULT_PROP_SIZE_DIST: u64 = MB;

/// Default key-count distance between two range properties
pub const DEFAULT_PROP_KEYS_DIST: u64 = 8 * KB;

/// Default number of flushed file pairs summarized by one `MultipleFilesStat`
pub const DEFAULT_MULTI_FILE_STAT_NUM: usize = 500;

/// Default concurrency hint passed to the storage when creating a stream
pub const DEFAULT_STORAGE_CONCURRENCY: usize = 20;

/// Upper bound on parallel sort workers, whatever the budget says
pub const DEFAULT_MAX_SORT_WORKERS: usize = 8;

/// Default value of the shared sort concurrency budget
pub const DEFAULT_SORT_CONCURRENCY: usize = 4;

/// Suffix appended to `{prefix}/{writer_id}` for statistics files
pub const DEFAULT_STAT_SUFFIX: &str = "_stat";

/// Default overlap above which the merge step is required
pub const DEFAULT_MERGE_SORT_OVERLAP_THRESHOLD: i64 = 1000;

/// Default number of data files handed to one merge-sort task
pub const DEFAULT_MERGE_SORT_FILE_COUNT_STEP: usize = 1000;

/// Tuning of a single [`Writer`](crate::writer::Writer)
#[derive(Debug, Clone)]
pub struct WriterConfig {
    // -------------------------------------------------------------------------
    // Memory Configuration
    // -------------------------------------------------------------------------
    /// Bytes of buffered records (including length headers) before a flush
    pub mem_size_limit: u64,

    /// Size of every buffer block; also the largest record accepted
    pub block_size: usize,

    /// Initial capacity of the location list
    pub write_batch_count: u64,

    // -------------------------------------------------------------------------
    // Range Index Configuration
    // -------------------------------------------------------------------------
    /// Range property is cut once its accumulated size reaches this value
    pub prop_size_dist: u64,

    /// Range property is cut once its key count reaches this value
    pub prop_keys_dist: u64,

    // -------------------------------------------------------------------------
    // Statistics Configuration
    // -------------------------------------------------------------------------
    /// Number of flushes grouped into one `MultipleFilesStat`
    pub multi_file_stat_num: usize,

    // -------------------------------------------------------------------------
    // Output Configuration
    // -------------------------------------------------------------------------
    /// Concurrency hint for each created storage stream
    pub storage_concurrency: usize,

    /// Directory suffix separating statistics files from data files
    pub stat_suffix: String,

    /// Encode keys so duplicates can be told apart by row id
    pub key_dupe_encoding: bool,

    // -------------------------------------------------------------------------
    // Sort Configuration
    // -------------------------------------------------------------------------
    /// Hard cap on workers used by the parallel sort
    pub max_sort_workers: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            mem_size_limit: DEFAULT_MEM_SIZE_LIMIT,
            block_size: DEFAULT_BLOCK_SIZE,
            write_batch_count: DEFAULT_WRITE_BATCH_COUNT,
            prop_size_dist: DEFAULT_PROP_SIZE_DIST,
            prop_keys_dist: DEFAULT_PROP_KEYS_DIST,
            multi_file_stat_num: DEFAULT_MULTI_FILE_STAT_NUM,
            storage_concurrency: DEFAULT_STORAGE_CONCURRENCY,
            stat_suffix: DEFAULT_STAT_SUFFIX.to_string(),
            key_dupe_encoding: false,
            max_sort_workers: DEFAULT_MAX_SORT_WORKERS,
        }
    }
}

impl WriterConfig {
    /// Reject values the writer cannot operate with
    pub fn validate(&self) -> crate::Result<()> {
        if self.mem_size_limit == 0 {
            return Err(crate::SortError::Config(
                "memory size limit must be greater than 0".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(crate::SortError::Config(
                "block size must be greater than 0".to_string(),
            ));
        }
        if self.block_size > u32::MAX as usize {
            return Err(crate::SortError::Config(format!(
                "block size {} exceeds the addressable maximum {}",
                self.block_size,
                u32::MAX
            )));
        }
        if self.multi_file_stat_num == 0 {
            return Err(crate::SortError::Config(
                "multi file stat group size must be greater than 0".to_string(),
            ));
        }
        if self.max_sort_workers == 0 {
            return Err(crate::SortError::Config(
                "max sort workers must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of blocks the memory limit allows (at least one)
    pub fn max_blocks(&self) -> usize {
        let block = self.block_size as u64;
        (self.mem_size_limit.div_ceil(block)).max(1) as usize
    }
}

/// Thresholds used by the downstream stage to plan merge sorting
#[derive(Debug, Clone, Copy)]
pub struct MergeSortConfig {
    /// Overlap above which files are merge-sorted before ingest
    pub overlap_threshold: i64,

    /// Max data files per merge-sort task
    pub file_count_step: usize,
}

impl Default for MergeSortConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: DEFAULT_MERGE_SORT_OVERLAP_THRESHOLD,
            file_count_step: DEFAULT_MERGE_SORT_FILE_COUNT_STEP,
        }
    }
}
