//! Ambient, cooperative cancellation shared across batch workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cheap, cloneable cancellation handle.
///
/// Every public entry point accepts one; workers check it at I/O boundaries and at each item
/// claim (see the batch engine's concurrency model). Cancellation never interrupts an
/// in-progress repair `Apply`; the atomic rename is always allowed to finish.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not yet cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
