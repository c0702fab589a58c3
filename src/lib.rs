//! # globalsort
//!
//! The write side of a global sort: an external sorted key-value writer that
//! - Buffers rows in a bounded, reusable block arena
//! - Sorts each batch (sequentially, or in parallel under a shared flush mutex)
//! - Persists it as a data file plus a range-properties file on external storage
//! - Summarizes min/max keys, sizes and file overlap for the later merge stage
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     WriterBuilder                            │
//! │              (config, pool, mutex, callback)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ build
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Writer                                │
//! │        write_row ──► PreAllocKvBuf ──► flush / close         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ sort + encode
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │KeyValueStore│─────────►│RangeProperties│
//!   │ (data file) │          │ (stat file)   │
//!   └──────┬──────┘          └──────┬───────┘
//!          └────────────┬───────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │ExternalStorage│
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod context;

pub mod membuf;
pub mod kv;
pub mod overlap;
pub mod storage;
pub mod writer;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, SortError};
pub use config::{MergeSortConfig, WriterConfig};
pub use context::Context;
pub use overlap::{get_max_overlapping, get_max_overlapping_total, Endpoint, EndpointKind};
pub use writer::{MultipleFilesStat, Writer, WriterBuilder, WriterSummary};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of globalsort
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
