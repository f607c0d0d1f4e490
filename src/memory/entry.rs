// The in-memory tier's per-id entry (spec §3 "Memory entry").

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

#[derive(Debug)]
pub struct MemoryEntry {
    pub id: String,
    /// Possibly-compressed stored bytes.
    pub bytes: Vec<u8>,
    pub compressed: bool,
    /// Stored size (i.e. `bytes.len()`), not the original size.
    pub size: u64,
    /// SHA-256 hex of the *original*, uncompressed bytes.
    pub checksum: String,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub stored_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    /// Atomic ref-count; `> 0` means pinned and ineligible for eviction/TTL.
    pub ref_count: AtomicI64,
}

impl MemoryEntry {
    pub fn is_pinned(&self) -> bool {
        self.ref_count.load(Ordering::SeqCst) > 0
    }

    pub fn increment_ref(&self) -> i64 {
        self.ref_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrements, never going below zero (a stray extra `Release` is a
    /// no-op rather than a corrupting underflow).
    pub fn release_ref(&self) -> i64 {
        let mut current = self.ref_count.load(Ordering::SeqCst);
        loop {
            if current <= 0 {
                return 0;
            }
            match self.ref_count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return current - 1,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Clone for MemoryEntry {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            bytes: self.bytes.clone(),
            compressed: self.compressed,
            size: self.size,
            checksum: self.checksum.clone(),
            content_type: self.content_type.clone(),
            metadata: self.metadata.clone(),
            stored_at: self.stored_at,
            accessed_at: self.accessed_at,
            ref_count: AtomicI64::new(self.ref_count.load(Ordering::SeqCst)),
        }
    }
}
