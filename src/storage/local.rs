//! Local filesystem storage
//!
//! Maps object paths onto files below a root directory.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::context::Context;
use crate::error::{Result, SortError};

use super::{ExternalFileWriter, ExternalStorage, WriterOption};

/// Storage backed by a directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Open storage rooted at `root`, creating the directory if needed
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Root directory of this storage
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File system location of an object path
    pub fn full_path(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

impl ExternalStorage for LocalStorage {
    fn create(
        &self,
        ctx: &Context,
        path: &str,
        option: &WriterOption,
    ) -> Result<Box<dyn ExternalFileWriter>> {
        ctx.check()?;

        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&full)?;

        debug!(path = %full.display(), concurrency = option.concurrency, "created local object");

        Ok(Box::new(LocalFileWriter {
            writer: Some(BufWriter::new(file)),
        }))
    }

    fn read_all(&self, ctx: &Context, path: &str) -> Result<Vec<u8>> {
        ctx.check()?;
        fs::read(self.full_path(path)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SortError::NotFound(path.to_string()),
            _ => SortError::Io(e),
        })
    }
}

/// Buffered writer over one local file
struct LocalFileWriter {
    /// Taken on close
    writer: Option<BufWriter<File>>,
}

impl ExternalFileWriter for LocalFileWriter {
    fn write(&mut self, ctx: &Context, buf: &[u8]) -> Result<usize> {
        ctx.check()?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SortError::Storage("write to closed local file".to_string()))?;
        writer.write_all(buf)?;
        Ok(buf.len())
    }

    fn close(&mut self, _ctx: &Context) -> Result<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| SortError::Storage("local file closed twice".to_string()))?;
        let file = writer.into_inner().map_err(|e| {
            SortError::Storage(format!("Failed to flush local file: {}", e))
        })?;
        file.sync_all()?;
        Ok(())
    }
}
