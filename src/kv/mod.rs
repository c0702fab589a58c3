//! KV Encoding Module
//!
//! Everything that turns buffered records into bytes on storage.
//!
//! ## Data File Format
//! Records are written back to back, exactly as they sit in the buffer:
//! ```text
//! ┌──────────────────┬─────────────┬──────────────────┬─────────┐
//! │ KeyLen: u64 (BE) │ Encoded Key │ ValLen: u64 (BE) │  Value  │
//! └──────────────────┴─────────────┴──────────────────┴─────────┘
//! ... repeated, keys non-decreasing ...
//! ```
//!
//! ## Statistics File Format
//! A sequence of length-prefixed range properties, see [`props`].

pub mod key_adapter;
pub mod props;
mod store;

pub use key_adapter::{DupDetectKeyAdapter, KeyAdapter, NoopKeyAdapter, MAX_ROW_ID_LEN};
pub use props::{decode_multi_props, RangePropertiesCollector, RangeProperty};
pub use store::{KeyValueStore, KvReader};
