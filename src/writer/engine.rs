//! Engine writer adapter
//!
//! Lets batch-oriented ingest code push encoded rows into a [`Writer`].

use crate::context::Context;
use crate::error::Result;

use super::Writer;

/// One encoded row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub val: Vec<u8>,
    /// Identifies the source row when keys may repeat
    pub row_id: Option<Vec<u8>>,
}

impl KvPair {
    pub fn new(key: impl Into<Vec<u8>>, val: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            val: val.into(),
            row_id: None,
        }
    }
}

/// Batch appender over a [`Writer`]
pub struct EngineWriter {
    writer: Writer,
}

impl EngineWriter {
    pub fn new(writer: Writer) -> Self {
        Self { writer }
    }

    /// Append every row of `rows` in order
    pub fn append_rows(&mut self, ctx: &Context, rows: &[KvPair]) -> Result<()> {
        for row in rows {
            self.writer
                .write_row(ctx, &row.key, &row.val, row.row_id.as_deref())?;
        }
        Ok(())
    }

    /// Rows are only durable after close; checkpoints need not wait for sync
    pub fn is_synced(&self) -> bool {
        true
    }

    pub fn close(&mut self, ctx: &Context) -> Result<()> {
        self.writer.close(ctx)
    }

    pub fn writer(&self) -> &Writer {
        &self.writer
    }
}
