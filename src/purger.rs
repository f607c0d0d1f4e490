// # Soft-delete purger
//
// A background worker that invokes a store's `purge_deleted` on a fixed
// interval (spec §4.G). Errors are logged and the worker keeps going —
// this and the tier TTL sweeps are the only places in the crate allowed to
// swallow errors, because they are best-effort background tasks (spec §7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

const FALLBACK_CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Anything that can purge soft-deleted rows on demand. A grace period
/// (formatted upstream as `"<N> seconds"` when surfaced to humans) governs
/// how long a soft-deleted row survives before this becomes eligible to
/// remove it for good.
#[async_trait::async_trait]
pub trait PurgeDeleted: Send + Sync {
    async fn purge_deleted(&self, grace_seconds: u64) -> crate::error::Result<u64>;
}

pub struct SoftDeletePurger {
    stop_flag: Arc<AtomicBool>,
    stopped: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl SoftDeletePurger {
    /// Spawns the worker loop. `cleanup_interval_seconds <= 0` falls back
    /// to 24 hours with a logged warning (spec §4.G).
    pub fn spawn<S>(store: Arc<S>, grace_seconds: u64, cleanup_interval_seconds: i64) -> Self
    where
        S: PurgeDeleted + 'static,
    {
        let interval = if cleanup_interval_seconds <= 0 {
            tracing::warn!(
                cleanup_interval_seconds,
                "soft-delete purger: non-positive interval, falling back to 24 hours"
            );
            FALLBACK_CLEANUP_INTERVAL
        } else {
            Duration::from_secs(cleanup_interval_seconds as u64)
        };

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
                match store.purge_deleted(grace_seconds).await {
                    Ok(purged) => {
                        if purged > 0 {
                            tracing::debug!(purged, "soft-delete purger: purge cycle complete");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "soft-delete purger: purge cycle failed");
                    }
                }
            }
            loop_stopped.notify_one();
        });

        Self {
            stop_flag,
            stopped,
            handle: Some(handle),
        }
    }

    /// Cancels the worker and blocks until it exits.
    pub async fn stop(mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.stopped.notified().await;
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
