//! Cooperative cancellation.
//!
//! A `CancellationToken` is handed into every strategy invocation and
//! polled immediately before and after each suspension point (model calls,
//! tool executions, backoff sleeps). Cancellation is best-effort: a tool
//! that is already running is abandoned only after it returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable cancellation flag shared between the orchestrator and the
/// strategy it is driving. One token per processed message; tokens are
/// never reset — a new turn gets a fresh token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
