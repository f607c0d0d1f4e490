// # Global singleton
//
// A process-wide in-memory cache, because consumers scattered across the
// process must observe one coherent cache rather than independent copies
// (spec §4.F, §9). Dependency-injected handles are still preferred at call
// sites; this is an initialization convenience for code paths that can't
// thread a handle through. The reset hook exists for tests only and must
// never be reachable from production code paths (spec §9).

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config;
use crate::disk::DiskStore;
use crate::memory::MemoryCache;

static INSTANCE: Lazy<RwLock<Option<Arc<MemoryCache>>>> = Lazy::new(|| RwLock::new(None));

fn build_from_env() -> Arc<MemoryCache> {
    let memory_cfg = config::memory_config_from_env();
    let disk_cfg = config::disk_config_from_env();

    let overflow = match DiskStore::new(disk_cfg) {
        Ok(store) => Some(Arc::new(store) as Arc<dyn crate::memory::OverflowSink>),
        Err(e) => {
            tracing::warn!(error = %e, "singleton: disk overflow sink unavailable, degrading to memory-only cache");
            None
        }
    };

    Arc::new(MemoryCache::with_overflow(memory_cfg, overflow))
}

/// Lazily constructs the process-wide cache on first access. If the disk
/// overflow sink fails to construct (e.g. an unwritable cache dir), the
/// singleton degrades to a memory-only store rather than failing startup.
pub fn global() -> Arc<MemoryCache> {
    if let Some(existing) = INSTANCE.read().as_ref() {
        return existing.clone();
    }
    let mut guard = INSTANCE.write();
    if let Some(existing) = guard.as_ref() {
        return existing.clone();
    }
    let built = build_from_env();
    *guard = Some(built.clone());
    built
}

/// Test-only: clears the singleton so the next `global()` call
/// reconstructs it from the current environment. Not reachable from
/// non-test code — production code must not rely on re-initialization
/// with different parameters after the first `global()` call (spec §9).
#[cfg(test)]
pub fn reset_for_tests() {
    *INSTANCE.write() = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    // `global()` is a process-wide static; serialize the tests that touch
    // it so they don't race cargo's default parallel test execution.
    static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    #[test]
    fn global_returns_the_same_instance_across_calls() {
        let _guard = TEST_LOCK.lock();
        reset_for_tests();
        let a = global();
        let b = global();
        assert!(Arc::ptr_eq(&a, &b));
        reset_for_tests();
    }

    #[test]
    fn reset_allows_reconstruction() {
        let _guard = TEST_LOCK.lock();
        reset_for_tests();
        let a = global();
        reset_for_tests();
        let b = global();
        assert!(!Arc::ptr_eq(&a, &b));
        reset_for_tests();
    }
}
