//! Pre-allocated KV buffer
//!
//! Bump allocator over a bounded list of pool blocks.

use std::sync::Arc;

use super::Pool;

/// Width of each length header in a buffered record
pub const LENGTH_BYTES: usize = 8;

/// Handle to one record inside a [`PreAllocKvBuf`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvLocation {
    pub block_idx: u32,
    pub offset: u32,
    pub length: u32,
}

/// Block arena holding the records of the current batch
///
/// Blocks are taken from the pool lazily, up to `max_blocks`. `reset` keeps
/// them for the next batch; `destroy` (or drop) hands them back to the pool.
pub struct PreAllocKvBuf {
    pool: Arc<Pool>,
    blocks: Vec<Box<[u8]>>,
    block_size: usize,
    max_blocks: usize,
    /// Blocks touched by the current batch; the active block is `in_use - 1`
    in_use: usize,
    /// Bump pointer inside the active block
    cur_offset: usize,
}

impl PreAllocKvBuf {
    /// Create a buffer of at most `max_blocks` blocks of `block_size` bytes
    pub fn new(pool: Arc<Pool>, block_size: usize, max_blocks: usize) -> Self {
        Self {
            pool,
            blocks: Vec::with_capacity(max_blocks),
            block_size,
            max_blocks: max_blocks.max(1),
            in_use: 0,
            cur_offset: 0,
        }
    }

    /// Reserve `len` contiguous bytes
    ///
    /// Returns `None` when neither the active block nor a further block within
    /// the limit can hold the record; the caller must flush and retry. A record
    /// longer than the block size never fits. The reserved span is reached
    /// through [`record_mut`](Self::record_mut).
    pub fn alloc(&mut self, len: usize) -> Option<KvLocation> {
        if len > self.block_size {
            return None;
        }

        if self.in_use == 0 || self.block_size - self.cur_offset < len {
            if self.in_use >= self.max_blocks {
                return None;
            }
            if self.in_use == self.blocks.len() {
                self.blocks.push(self.pool.acquire(self.block_size));
            }
            self.in_use += 1;
            self.cur_offset = 0;
        }

        let block_idx = self.in_use - 1;
        let offset = self.cur_offset;
        self.cur_offset += len;

        Some(KvLocation {
            block_idx: block_idx as u32,
            offset: offset as u32,
            length: len as u32,
        })
    }

    /// Writable bytes of the record addressed by `loc`
    pub fn record_mut(&mut self, loc: &KvLocation) -> &mut [u8] {
        let start = loc.offset as usize;
        &mut self.blocks[loc.block_idx as usize][start..start + loc.length as usize]
    }

    /// Full record bytes (headers included) addressed by `loc`
    pub fn record(&self, loc: &KvLocation) -> &[u8] {
        let start = loc.offset as usize;
        &self.blocks[loc.block_idx as usize][start..start + loc.length as usize]
    }

    /// Encoded key of the record addressed by `loc`
    pub fn key(&self, loc: &KvLocation) -> &[u8] {
        let record = self.record(loc);
        let key_len = read_len(record);
        &record[LENGTH_BYTES..LENGTH_BYTES + key_len]
    }

    /// Forget all records but keep the blocks for the next batch
    pub fn reset(&mut self) {
        self.in_use = 0;
        self.cur_offset = 0;
    }

    /// Return every block to the pool
    pub fn destroy(&mut self) {
        self.reset();
        for block in self.blocks.drain(..) {
            self.pool.release(block);
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Blocks currently held (used or kept for reuse)
    pub fn allocated_blocks(&self) -> usize {
        self.blocks.len()
    }
}

impl Drop for PreAllocKvBuf {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Read a big-endian u64 length header from the front of `buf`
pub(crate) fn read_len(buf: &[u8]) -> usize {
    let mut header = [0u8; LENGTH_BYTES];
    header.copy_from_slice(&buf[..LENGTH_BYTES]);
    u64::from_be_bytes(header) as usize
}
