//! Error types for globalsort
//!
//! Provides a unified error type for all writer operations.

use thiserror::Error;

/// Result type alias using SortError
pub type Result<T> = std::result::Result<T, SortError>;

/// Unified error type for globalsort operations
#[derive(Debug, Error)]
pub enum SortError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Buffer Errors
    // -------------------------------------------------------------------------
    /// A single record does not fit in an empty block.
    #[error("failed to allocate kv buffer: record of {len} bytes exceeds block size {block_size}")]
    RecordTooLarge { len: usize, block_size: usize },

    #[error("row id of {len} bytes exceeds the maximum of {max}")]
    RowIdTooLarge { len: usize, max: usize },

    // -------------------------------------------------------------------------
    // Writer Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("writer {0} has been closed")]
    WriterClosed(String),

    #[error("operation cancelled")]
    Cancelled,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted data: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for SortError {
    fn from(e: bincode::Error) -> Self {
        SortError::Serialization(e.to_string())
    }
}
