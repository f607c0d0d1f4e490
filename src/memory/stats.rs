// Monotonic counters for the in-memory tier (spec §4.B `Stats`).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Counters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub compressions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    pub current_size: u64,
    pub max_size: u64,
    pub item_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub compressions: u64,
}

impl Counters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compression(&self) {
        self.compressions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.evictions.load(Ordering::Relaxed),
            self.compressions.load(Ordering::Relaxed),
        )
    }
}
