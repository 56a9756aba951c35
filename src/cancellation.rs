/*!
 * Cooperative cancellation for translation runs.
 *
 * A `CancellationToken` is passed explicitly into the orchestrator and
 * checked at well-defined suspension points: before each scene, before
 * each batch, and immediately after any network-bound call returns. No
 * preemption occurs mid-request.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::TranslationError;

/// Shared cancellation flag, settable from outside the run
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation; every clone of the token observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been signalled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Raise `Aborted` if cancellation has been signalled
    pub fn check(&self) -> Result<(), TranslationError> {
        if self.is_cancelled() {
            Err(TranslationError::Aborted)
        } else {
            Ok(())
        }
    }
}
