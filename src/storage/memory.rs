//! In-memory storage
//!
//! Objects become visible only after their stream is closed, like an object
//! store completing a multi-part upload.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::context::Context;
use crate::error::{Result, SortError};

use super::{ExternalFileWriter, ExternalStorage, WriterOption};

/// Storage that keeps every object in a shared map
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all closed objects, sorted
    pub fn paths(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Names of closed objects under `prefix`, sorted
    pub fn paths_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .read()
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.objects.read().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ExternalStorage for MemStorage {
    fn create(
        &self,
        ctx: &Context,
        path: &str,
        _option: &WriterOption,
    ) -> Result<Box<dyn ExternalFileWriter>> {
        ctx.check()?;
        Ok(Box::new(MemFileWriter {
            objects: Arc::clone(&self.objects),
            path: path.to_string(),
            buf: Vec::new(),
            closed: false,
        }))
    }

    fn read_all(&self, ctx: &Context, path: &str) -> Result<Vec<u8>> {
        ctx.check()?;
        self.get(path)
            .map(|data| data.to_vec())
            .ok_or_else(|| SortError::NotFound(path.to_string()))
    }
}

struct MemFileWriter {
    objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
    path: String,
    buf: Vec<u8>,
    closed: bool,
}

impl ExternalFileWriter for MemFileWriter {
    fn write(&mut self, ctx: &Context, buf: &[u8]) -> Result<usize> {
        ctx.check()?;
        if self.closed {
            return Err(SortError::Storage(format!(
                "write to closed object {}",
                self.path
            )));
        }
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn close(&mut self, _ctx: &Context) -> Result<()> {
        if self.closed {
            return Err(SortError::Storage(format!(
                "object {} closed twice",
                self.path
            )));
        }
        self.closed = true;
        let data = Bytes::from(std::mem::take(&mut self.buf));
        self.objects.write().insert(self.path.clone(), data);
        Ok(())
    }
}
