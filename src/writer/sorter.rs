//! Flush sort strategies
//!
//! Both strategies order buffered records by the byte order of their encoded
//! keys through the one shared comparator, so they always agree.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::warn;

use crate::config::DEFAULT_SORT_CONCURRENCY;
use crate::membuf::{KvLocation, PreAllocKvBuf};

/// Byte-lexicographic order of the keys behind two locations
pub fn compare_locations(buf: &PreAllocKvBuf, a: &KvLocation, b: &KvLocation) -> Ordering {
    buf.key(a).cmp(buf.key(b))
}

/// How a flush orders its batch
pub trait SortStrategy: Send {
    fn sort(&mut self, locations: &mut [KvLocation], buf: &PreAllocKvBuf);

    fn name(&self) -> &'static str;
}

/// Single-threaded comparison sort
#[derive(Debug, Default)]
pub struct SequentialSort;

impl SortStrategy for SequentialSort {
    fn sort(&mut self, locations: &mut [KvLocation], buf: &PreAllocKvBuf) {
        locations.sort_unstable_by(|a, b| compare_locations(buf, a, b));
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

/// Live worker budget shared with whoever tunes sort concurrency
///
/// Cloning shares the underlying counter; `set` is observed by the next flush.
#[derive(Debug, Clone)]
pub struct SortConcurrency(Arc<AtomicUsize>);

impl SortConcurrency {
    pub fn new(workers: usize) -> Self {
        Self(Arc::new(AtomicUsize::new(workers)))
    }

    pub fn get(&self) -> usize {
        self.0.load(AtomicOrdering::Relaxed)
    }

    pub fn set(&self, workers: usize) {
        self.0.store(workers, AtomicOrdering::Relaxed);
    }
}

impl Default for SortConcurrency {
    fn default() -> Self {
        Self::new(DEFAULT_SORT_CONCURRENCY)
    }
}

/// Bounded-parallelism sort on a private rayon pool
///
/// Workers = min(`max_workers`, current budget), at least one. The pool is
/// rebuilt only when that number changes.
pub struct ParallelSort {
    budget: SortConcurrency,
    max_workers: usize,
    pool: Option<(usize, ThreadPool)>,
}

impl ParallelSort {
    pub fn new(budget: SortConcurrency, max_workers: usize) -> Self {
        Self {
            budget,
            max_workers: max_workers.max(1),
            pool: None,
        }
    }

    /// Worker count the next sort will use
    pub fn workers(&self) -> usize {
        self.max_workers.min(self.budget.get()).max(1)
    }

    fn pool_for(&mut self, workers: usize) -> Result<&ThreadPool, rayon::ThreadPoolBuildError> {
        let pool = match self.pool.take() {
            Some((n, pool)) if n == workers => pool,
            _ => ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("globalsort-sort-{}", i))
                .build()?,
        };
        Ok(&self.pool.insert((workers, pool)).1)
    }
}

impl SortStrategy for ParallelSort {
    fn sort(&mut self, locations: &mut [KvLocation], buf: &PreAllocKvBuf) {
        let workers = self.workers();
        if workers == 1 {
            SequentialSort.sort(locations, buf);
            return;
        }

        match self.pool_for(workers) {
            Ok(pool) => pool.install(|| {
                locations.par_sort_unstable_by(|a, b| compare_locations(buf, a, b));
            }),
            Err(e) => {
                warn!(workers, error = %e, "failed to build sort pool, sorting sequentially");
                SequentialSort.sort(locations, buf);
            }
        }
    }

    fn name(&self) -> &'static str {
        "parallel"
    }
}
