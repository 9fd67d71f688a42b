use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{ComposeError, ComposeResult};

/// Shared flag for cooperative cancellation of a composition.
///
/// Clones observe the same flag. Cancellation is checked between scenes and before the output is
/// published; work already handed to a media tool runs to completion.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn checkpoint(&self) -> ComposeResult<()> {
        if self.is_cancelled() {
            return Err(ComposeError::Cancelled);
        }
        Ok(())
    }
}
