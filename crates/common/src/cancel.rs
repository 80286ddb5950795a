//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{LammahError, LammahResult};

/// A shared stop flag checked at every suspension point of a run.
///
/// Clones observe the same flag, so a handle can be given to a signal
/// handler while the pipeline holds another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` if cancellation was requested.
    pub fn check(&self) -> LammahResult<()> {
        if self.is_cancelled() {
            return Err(LammahError::Cancelled);
        }
        Ok(())
    }
}
