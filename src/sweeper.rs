// # Periodic TTL sweeper
//
// Spec §4.A/§4.B/§4.E each require a standalone background task — not just
// the lazy per-`Get` TTL check or the opportunistic on-disk-full sweep —
// that invokes the tier's `sweep_expired` every 5 minutes, and §5 requires
// it to "own a single worker context" that `Close`/`Stop` cancels and
// joins. This is exactly the shape module G's `SoftDeletePurger`
// (`purger.rs`) already has, generalized here so tiers A, B, and E can each
// wrap their own `sweep_expired` in one without duplicating the
// ticker/stop-flag/join plumbing three times.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Spec §4.A/§4.B/§4.E: "every 5 minutes".
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A periodic background task that calls `sweep` on a fixed interval until
/// stopped. One instance backs each of tiers A, B, and E's TTL sweeps.
pub struct TtlSweeper {
    stop_flag: Arc<AtomicBool>,
    stopped: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl TtlSweeper {
    /// Spawns the worker loop, calling `sweep` once per tick. `sweep` is
    /// expected to be the tier's own `sweep_expired` (or a thin wrapper
    /// around it), already holding whatever lock it needs internally.
    pub fn spawn<F>(interval: Duration, mut sweep: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(Notify::new());

        let loop_stop_flag = stop_flag.clone();
        let loop_stopped = stopped.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if loop_stop_flag.load(Ordering::SeqCst) {
                    break;
                }
                sweep();
            }
            loop_stopped.notify_one();
        });

        Self {
            stop_flag,
            stopped,
            handle: Some(handle),
        }
    }

    /// Cancels the worker and blocks until it exits, the same shutdown
    /// handshake as `SoftDeletePurger::stop`.
    pub async fn stop(mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.stopped.notified().await;
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[tokio::test(flavor = "multi_thread")]
    async fn sweeper_ticks_and_stops_cleanly() {
        let calls = Arc::new(AtomicU64::new(0));
        let loop_calls = calls.clone();
        let sweeper = TtlSweeper::spawn(Duration::from_millis(20), move || {
            loop_calls.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(150)).await;
        sweeper.stop().await;
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }
}
