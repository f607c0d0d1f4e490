// Cooperative cancellation for externally facing operations (spec §5).
//
// None of the core tiers hold a lock across an `.await` or split a single
// operation into resumable steps, so there is nothing here to `select!`
// against. Cancellation is checked at entry and after the blocking work
// completes: in-progress disk or database I/O is allowed to finish (so a
// partially written file or table is never left behind), but the result is
// discarded and `Cancelled` is returned instead, matching spec §5's "allowed
// to complete... but no further work is performed" rule. Grounded on the
// teacher's plain `Arc<AtomicBool>` drain-cancellation flag
// (`enterprise_optimization/connection_draining.rs`) rather than
// `tokio_util::CancellationToken`, which is not in the teacher's dependency
// stack.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CacheError, Result};

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` if already cancelled, else `Ok(())`.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CacheError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Runs `op`, then discards its result in favor of `Cancelled` if this
    /// token was cancelled while `op` ran. `op`'s side effects (a completed
    /// disk write, a committed table) are never rolled back.
    pub fn guard<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        self.check()?;
        let out = op()?;
        if self.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        Ok(out)
    }
}
