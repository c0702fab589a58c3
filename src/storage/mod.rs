//! Storage Module
//!
//! The external storage capability consumed by writers.
//!
//! ## Responsibilities
//! - Create write streams at a path (`create`)
//! - Accept bytes and make them durable on `close`
//! - Read an object back whole (verification and inspection only)
//!
//! ## Implementations
//! - [`LocalStorage`]: files under a root directory
//! - [`MemStorage`]: objects kept in memory, visible once their stream closes
//!
//! Paths are `/`-separated object names, never absolute file system paths.

mod local;
mod memory;

pub use local::LocalStorage;
pub use memory::MemStorage;

use crate::context::Context;
use crate::error::Result;

/// Options applied when creating a stream
#[derive(Debug, Clone, Copy)]
pub struct WriterOption {
    /// Parallel upload parts a remote store may use for this stream
    pub concurrency: usize,
}

impl Default for WriterOption {
    fn default() -> Self {
        Self {
            concurrency: crate::config::DEFAULT_STORAGE_CONCURRENCY,
        }
    }
}

/// A writable object stream
pub trait ExternalFileWriter: Send {
    /// Append `buf`, returning the number of bytes accepted
    fn write(&mut self, ctx: &Context, buf: &[u8]) -> Result<usize>;

    /// Finish the object. Must be called exactly once, even after errors.
    fn close(&mut self, ctx: &Context) -> Result<()>;
}

/// An object store rooted somewhere
pub trait ExternalStorage: Send + Sync {
    /// Create (or truncate) the object at `path`
    fn create(
        &self,
        ctx: &Context,
        path: &str,
        option: &WriterOption,
    ) -> Result<Box<dyn ExternalFileWriter>>;

    /// Read a closed object back in full
    fn read_all(&self, ctx: &Context, path: &str) -> Result<Vec<u8>>;
}

/// Join two object path segments with a single `/`
pub fn join_path(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        return name.to_string();
    }
    format!("{}/{}", base, name)
}
