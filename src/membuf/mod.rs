//! Memory Buffer Module
//!
//! Fixed-size block arena used by writers to hold records between flushes.
//!
//! ## Responsibilities
//! - Hand out contiguous spans for variable-length records (bump pointer)
//! - Keep blocks across batches so steady-state writing does not allocate
//! - Return blocks to a [`Pool`] that several writers may share
//!
//! ## Record Layout
//! ```text
//! ┌──────────────────┬─────────────┬──────────────────┬─────────┐
//! │ KeyLen: u64 (BE) │ Encoded Key │ ValLen: u64 (BE) │  Value  │
//! └──────────────────┴─────────────┴──────────────────┴─────────┘
//! ```
//! A [`KvLocation`] addresses one record as `{block_idx, offset, length}`.

mod kvbuf;

pub use kvbuf::{KvLocation, PreAllocKvBuf, LENGTH_BYTES};

use std::collections::HashMap;

use parking_lot::Mutex;

/// Thread-safe free list of buffer blocks, keyed by block size
///
/// Shared across writers through `Arc<Pool>`; a writer's live blocks are
/// exclusively owned by its buffer until they are released.
#[derive(Debug, Default)]
pub struct Pool {
    free: Mutex<HashMap<usize, Vec<Box<[u8]>>>>,
}

impl Pool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a block of exactly `size` bytes, reusing a cached one if possible
    pub fn acquire(&self, size: usize) -> Box<[u8]> {
        if let Some(block) = self.free.lock().get_mut(&size).and_then(Vec::pop) {
            return block;
        }
        vec![0u8; size].into_boxed_slice()
    }

    /// Give a block back for reuse
    pub fn release(&self, block: Box<[u8]>) {
        self.free.lock().entry(block.len()).or_default().push(block);
    }

    /// Number of cached blocks (all sizes)
    pub fn cached_blocks(&self) -> usize {
        self.free.lock().values().map(Vec::len).sum()
    }
}
