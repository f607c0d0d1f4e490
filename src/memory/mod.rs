// # In-memory cache tier
//
// A bounded, LRU-evicted `(id -> bytes)` cache with transparent gzip
// compression, SHA-256 checksums, atomic ref-counting for session pins, and
// TTL expiry (spec §4.B). When memory pressure can't be relieved by
// eviction alone, entries spill to a pluggable overflow sink (normally the
// disk tier, §4.A).
//
// Generalized from the teacher's `QueryCache` (`cache/query_cache.rs`):
// same HashMap-under-lock + LRU-queue shape and the same statistics-object
// pattern, but keyed on opaque byte blobs rather than SQL text, with
// compression, checksums, ref-counting, and overflow eviction layered on
// top per spec.

pub mod compress;
pub mod entry;
pub mod sink;
pub mod stats;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::AtomicI64;
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::cancellation::CancellationToken;
use crate::config::MemoryConfig;
use crate::error::{CacheError, Result};
use crate::reference::{Location, Reference};
use crate::sweeper::{TtlSweeper, DEFAULT_SWEEP_INTERVAL};

pub use entry::MemoryEntry;
pub use sink::OverflowSink;
pub use stats::MemoryStats;
use stats::Counters;

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

struct Inner {
    entries: HashMap<String, MemoryEntry>,
    /// Front = most recently used, back = least recently used.
    lru: VecDeque<String>,
    current_size: u64,
}

fn remove_from_lru(lru: &mut VecDeque<String>, id: &str) {
    if let Some(pos) = lru.iter().position(|x| x == id) {
        lru.remove(pos);
    }
}

/// The in-memory tier. One read-write lock guards `entries`/`lru`/
/// `current_size`; hit/miss/eviction/compression counters and each entry's
/// `ref_count` are separate atomics so hot-path readers don't contend on
/// them (spec §5).
pub struct MemoryCache {
    config: MemoryConfig,
    inner: RwLock<Inner>,
    counters: Counters,
    overflow: Option<Arc<dyn OverflowSink>>,
}

impl MemoryCache {
    pub fn new(config: MemoryConfig) -> Self {
        Self::with_overflow(config, None)
    }

    pub fn with_overflow(config: MemoryConfig, overflow: Option<Arc<dyn OverflowSink>>) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                lru: VecDeque::new(),
                current_size: 0,
            }),
            counters: Counters::default(),
            overflow,
        }
    }

    /// Stores `bytes` under `id`, compressing above the configured
    /// threshold, evicting LRU entries to make room, and falling back to
    /// the overflow sink if eviction alone can't free enough space.
    pub fn store(
        &self,
        id: &str,
        bytes: &[u8],
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Reference> {
        if id.trim().is_empty() {
            return Err(CacheError::Invalid("store: empty id".to_string()));
        }

        let checksum = sha256_hex(bytes);
        let (stored_bytes, compressed) =
            if bytes.len() as u64 >= self.config.compression_threshold_bytes {
                match compress::try_compress(bytes) {
                    Some(c) => {
                        self.counters.record_compression();
                        (c, true)
                    }
                    None => (bytes.to_vec(), false),
                }
            } else {
                (bytes.to_vec(), false)
            };
        let effective_size = stored_bytes.len() as u64;
        let now = Utc::now();

        let mut inner = self.inner.write();

        while inner.current_size + effective_size > self.config.max_size_bytes {
            if !self.evict_one_locked(&mut inner) {
                break;
            }
        }

        if inner.current_size + effective_size > self.config.max_size_bytes {
            drop(inner);
            return match &self.overflow {
                Some(sink) => {
                    sink.store(
                        id,
                        &stored_bytes,
                        &checksum,
                        content_type,
                        compressed,
                        metadata.clone(),
                    )?;
                    Ok(Reference {
                        id: id.to_string(),
                        size_bytes: bytes.len() as u64,
                        location: Location::Disk,
                        checksum,
                        compressed,
                        content_type: content_type.to_string(),
                        metadata,
                        stored_at: now,
                    })
                }
                None => Err(CacheError::NoCapacity(format!(
                    "no room for {id} ({effective_size} bytes) and no overflow sink configured"
                ))),
            };
        }

        if let Some(old) = inner.entries.remove(id) {
            inner.current_size = inner.current_size.saturating_sub(old.size);
            remove_from_lru(&mut inner.lru, id);
        }

        inner.entries.insert(
            id.to_string(),
            MemoryEntry {
                id: id.to_string(),
                bytes: stored_bytes,
                compressed,
                size: effective_size,
                checksum: checksum.clone(),
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
                stored_at: now,
                accessed_at: now,
                ref_count: AtomicI64::new(0),
            },
        );
        inner.lru.push_front(id.to_string());
        inner.current_size += effective_size;

        Ok(Reference {
            id: id.to_string(),
            size_bytes: bytes.len() as u64,
            location: Location::Memory,
            checksum,
            compressed,
            content_type: content_type.to_string(),
            metadata,
            stored_at: now,
        })
    }

    /// Cancelable form of [`Self::store`] (spec §5: gzip compression on
    /// large inputs is one of the core's blocking points). The entry is
    /// still inserted if cancellation lands mid-call; only the returned
    /// outcome becomes `Cancelled`.
    pub fn store_cancelable(
        &self,
        token: &CancellationToken,
        id: &str,
        bytes: &[u8],
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Reference> {
        token.guard(|| self.store(id, bytes, content_type, metadata))
    }

    /// Cancelable form of [`Self::get`].
    pub fn get_cancelable(&self, token: &CancellationToken, reference: &Reference) -> Result<Vec<u8>> {
        token.guard(|| self.get(reference))
    }

    /// Resolves `reference` to its original bytes, wherever the data
    /// currently lives. Per spec §3 invariant 3, `reference.location` is a
    /// hint from `Store` time, not a retrieval instruction — eviction may
    /// have since moved the entry to the overflow sink.
    pub fn get(&self, reference: &Reference) -> Result<Vec<u8>> {
        let id = reference.id.as_str();
        let ttl = Duration::seconds(self.config.ttl_seconds as i64);

        {
            let mut inner = self.inner.write();
            if let Some(entry) = inner.entries.get(id) {
                if Utc::now().signed_duration_since(entry.accessed_at) > ttl {
                    let removed = inner.entries.remove(id).unwrap();
                    inner.current_size = inner.current_size.saturating_sub(removed.size);
                    remove_from_lru(&mut inner.lru, id);
                    self.counters.record_eviction();
                    return Err(CacheError::Expired(id.to_string()));
                }

                if !reference.checksum.is_empty() && !entry.compressed {
                    let actual = sha256_hex(&entry.bytes);
                    if actual != reference.checksum {
                        return Err(CacheError::ChecksumMismatch {
                            id: id.to_string(),
                            expected: reference.checksum.clone(),
                            actual,
                        });
                    }
                }

                let compressed = entry.compressed;
                let raw = entry.bytes.clone();

                let entry_mut = inner.entries.get_mut(id).unwrap();
                entry_mut.accessed_at = Utc::now();
                remove_from_lru(&mut inner.lru, id);
                inner.lru.push_front(id.to_string());
                self.counters.record_hit();

                let bytes = if compressed { compress::decompress(&raw)? } else { raw };
                return Ok(bytes);
            }
        }

        if let Some(sink) = &self.overflow {
            if let Ok(raw) = sink.retrieve(id) {
                self.counters.record_hit();
                let bytes = if reference.compressed {
                    compress::decompress(&raw)?
                } else {
                    raw
                };
                if !reference.checksum.is_empty() && !reference.compressed {
                    let actual = sha256_hex(&bytes);
                    if actual != reference.checksum {
                        return Err(CacheError::ChecksumMismatch {
                            id: id.to_string(),
                            expected: reference.checksum.clone(),
                            actual,
                        });
                    }
                }
                return Ok(bytes);
            }
        }

        self.counters.record_miss();
        Err(CacheError::NotFound(id.to_string()))
    }

    /// Increments an entry's ref-count, pinning it against eviction/TTL.
    /// No-op if `id` is absent (spec §4.B) — callers bootstrap pins via
    /// [`crate::tracker::SessionTracker`].
    pub fn increment_ref_count(&self, id: &str) {
        let inner = self.inner.read();
        if let Some(entry) = inner.entries.get(id) {
            entry.increment_ref();
        }
    }

    /// Decrements an entry's ref-count. No-op if `id` is absent.
    pub fn release(&self, id: &str) {
        let inner = self.inner.read();
        if let Some(entry) = inner.entries.get(id) {
            entry.release_ref();
        }
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        {
            let mut inner = self.inner.write();
            if let Some(entry) = inner.entries.remove(id) {
                inner.current_size = inner.current_size.saturating_sub(entry.size);
                remove_from_lru(&mut inner.lru, id);
                return Ok(());
            }
        }
        match &self.overflow {
            Some(sink) => sink.delete(id),
            None => Err(CacheError::NotFound(id.to_string())),
        }
    }

    pub fn stats(&self) -> MemoryStats {
        let inner = self.inner.read();
        let (hits, misses, evictions, compressions) = self.counters.snapshot();
        MemoryStats {
            current_size: inner.current_size,
            max_size: self.config.max_size_bytes,
            item_count: inner.entries.len(),
            hits,
            misses,
            evictions,
            compressions,
        }
    }

    /// Background TTL sweep (spec §4.B): removes unpinned entries whose
    /// `accessed_at` is older than the configured TTL. Runs every 5 minutes
    /// from a `tokio` task and is also enforced lazily in `get`.
    pub fn sweep_expired(&self) {
        let ttl = Duration::seconds(self.config.ttl_seconds as i64);
        let now = Utc::now();
        let mut inner = self.inner.write();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| !e.is_pinned() && now.signed_duration_since(e.accessed_at) > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(entry) = inner.entries.remove(&id) {
                inner.current_size = inner.current_size.saturating_sub(entry.size);
                remove_from_lru(&mut inner.lru, &id);
                self.counters.record_eviction();
                tracing::debug!(id, "memory tier: swept expired entry");
            }
        }
    }

    /// Spawns the standalone periodic TTL sweeper spec §4.B/§5 require: a
    /// background task ticking every 5 minutes and calling
    /// [`Self::sweep_expired`], independent of the lazy per-`Get` TTL check.
    /// Stopping it is `TtlSweeper::stop(sweeper).await`.
    pub fn spawn_ttl_sweeper(self: &Arc<Self>) -> TtlSweeper {
        self.spawn_ttl_sweeper_with_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// As [`Self::spawn_ttl_sweeper`], with a caller-chosen interval —
    /// tests use a short one instead of waiting 5 real minutes.
    pub fn spawn_ttl_sweeper_with_interval(self: &Arc<Self>, interval: std::time::Duration) -> TtlSweeper {
        let cache = self.clone();
        TtlSweeper::spawn(interval, move || cache.sweep_expired())
    }

    /// Evicts the oldest unpinned entry, skipping pinned ones, copying it
    /// to the overflow sink (if configured) before removing it from
    /// memory. Returns whether a slot was freed.
    fn evict_one_locked(&self, inner: &mut Inner) -> bool {
        let mut victim_idx = None;
        for (idx, id) in inner.lru.iter().enumerate().rev() {
            if let Some(entry) = inner.entries.get(id) {
                if !entry.is_pinned() {
                    victim_idx = Some(idx);
                    break;
                }
            }
        }
        let idx = match victim_idx {
            Some(i) => i,
            None => return false,
        };
        let id = inner.lru.remove(idx).unwrap();
        let entry = match inner.entries.remove(&id) {
            Some(e) => e,
            None => return false,
        };
        inner.current_size = inner.current_size.saturating_sub(entry.size);

        if let Some(sink) = &self.overflow {
            if let Err(e) = sink.store(
                &id,
                &entry.bytes,
                &entry.checksum,
                &entry.content_type,
                entry.compressed,
                entry.metadata.clone(),
            ) {
                tracing::warn!(id = %id, error = %e, "eviction: overflow sink write failed, data lost");
            }
        }

        self.counters.record_eviction();
        true
    }
}
