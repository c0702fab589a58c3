//! Cancellation context
//!
//! Every blocking operation takes a `&Context`. Cancelling any clone of a
//! context is observed by all others.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, SortError};

/// Cooperative cancellation handle
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    /// A fresh context that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this context and all of its clones
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the context has been cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(SortError::Cancelled);
        }
        Ok(())
    }
}
