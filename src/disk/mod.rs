// Disk overflow tier (spec §4.A): a durable, size-bounded byte store keyed
// by id, used as the in-memory tier's eviction target.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::cancellation::CancellationToken;
use crate::config::DiskConfig;
use crate::error::{CacheError, Result};
use crate::sweeper::{TtlSweeper, DEFAULT_SWEEP_INTERVAL};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// In-memory metadata kept alongside each on-disk file. Spec §9 leaves
/// whether this should itself be persisted to disk as an open question;
/// this implementation keeps it in memory only (decided in DESIGN.md).
#[derive(Debug, Clone)]
pub struct DiskEntryMetadata {
    pub id: String,
    pub path: PathBuf,
    pub size: u64,
    pub stored_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub checksum: String,
    pub content_type: String,
    pub compressed: bool,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
pub struct DiskStats {
    pub current_size: u64,
    pub max_size: u64,
    pub item_count: usize,
}

struct Inner {
    entries: HashMap<String, DiskEntryMetadata>,
}

/// Durable byte store backing memory-tier overflow. One mutex guards
/// metadata and `current_size`; file I/O happens while it is held, which is
/// acceptable because this tier is the deliberately slow path (spec §5).
pub struct DiskStore {
    config: DiskConfig,
    inner: Mutex<Inner>,
    current_size: AtomicU64,
}

impl DiskStore {
    pub fn new(config: DiskConfig) -> Result<Self> {
        fs::create_dir_all(&config.cache_dir)?;
        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
            }),
            current_size: AtomicU64::new(0),
        })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.config.cache_dir.join(format!("{id}.dat"))
    }

    /// Writes `bytes` to `<cache_dir>/<id>.dat` with mode 0600. Fails with
    /// `DiskFull` if there is no room even after an expired-entry sweep.
    pub fn store(
        &self,
        id: &str,
        bytes: &[u8],
        checksum: &str,
        content_type: &str,
        compressed: bool,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        let incoming = bytes.len() as u64;
        {
            let mut inner = self.inner.lock();
            let current = self.current_size.load(Ordering::SeqCst);
            if current + incoming > self.config.max_size_bytes {
                self.sweep_expired_locked(&mut inner);
            }
            let current = self.current_size.load(Ordering::SeqCst);
            if current + incoming > self.config.max_size_bytes {
                return Err(CacheError::DiskFull {
                    current,
                    incoming,
                    max: self.config.max_size_bytes,
                });
            }

            let path = self.path_for(id);
            let mut file = fs::File::create(&path)?;
            file.write_all(bytes)?;
            #[cfg(unix)]
            {
                let mut perms = file.metadata()?.permissions();
                perms.set_mode(0o600);
                fs::set_permissions(&path, perms)?;
            }

            let now = Utc::now();
            if let Some(old) = inner.entries.insert(
                id.to_string(),
                DiskEntryMetadata {
                    id: id.to_string(),
                    path,
                    size: incoming,
                    stored_at: now,
                    accessed_at: now,
                    checksum: checksum.to_string(),
                    content_type: content_type.to_string(),
                    compressed,
                    metadata,
                },
            ) {
                self.current_size.fetch_sub(old.size, Ordering::SeqCst);
            }
            self.current_size.fetch_add(incoming, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Cancelable form of [`Self::store`] (spec §5: disk I/O is one of the
    /// core's blocking points). The file write still completes once
    /// started; only the returned outcome changes to `Cancelled` if `token`
    /// was cancelled before or during the call.
    pub fn store_cancelable(
        &self,
        token: &CancellationToken,
        id: &str,
        bytes: &[u8],
        checksum: &str,
        content_type: &str,
        compressed: bool,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        token.guard(|| self.store(id, bytes, checksum, content_type, compressed, metadata))
    }

    /// Reads the file for `id`, updating `accessed_at`.
    pub fn retrieve(&self, id: &str) -> Result<Vec<u8>> {
        let path = {
            let mut inner = self.inner.lock();
            let entry = inner
                .entries
                .get_mut(id)
                .ok_or_else(|| CacheError::NotFound(id.to_string()))?;
            entry.accessed_at = Utc::now();
            entry.path.clone()
        };
        fs::read(&path).map_err(|e| CacheError::Corrupted(format!("{id}: {e}")))
    }

    /// Cancelable form of [`Self::retrieve`].
    pub fn retrieve_cancelable(&self, token: &CancellationToken, id: &str) -> Result<Vec<u8>> {
        token.guard(|| self.retrieve(id))
    }

    pub fn metadata(&self, id: &str) -> Option<DiskEntryMetadata> {
        self.inner.lock().entries.get(id).cloned()
    }

    /// Removes the file (ignoring ENOENT) and its metadata.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.entries.remove(id) {
            Some(entry) => {
                match fs::remove_file(&entry.path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                self.current_size.fetch_sub(entry.size, Ordering::SeqCst);
                Ok(())
            }
            None => Err(CacheError::NotFound(id.to_string())),
        }
    }

    /// Atomic read-then-delete. If the delete fails after a successful
    /// read, the bytes are still returned and the delete error is swallowed
    /// — the caller now represents the data (spec §4.A).
    pub fn promote(&self, id: &str) -> Result<(Vec<u8>, DiskEntryMetadata)> {
        let bytes = self.retrieve(id)?;
        let meta = self
            .metadata(id)
            .ok_or_else(|| CacheError::NotFound(id.to_string()))?;
        if let Err(e) = self.delete(id) {
            tracing::warn!(id, error = %e, "promote: delete after read failed, data now owned by caller");
        }
        Ok((bytes, meta))
    }

    pub fn stats(&self) -> DiskStats {
        let inner = self.inner.lock();
        DiskStats {
            current_size: self.current_size.load(Ordering::SeqCst),
            max_size: self.config.max_size_bytes,
            item_count: inner.entries.len(),
        }
    }

    fn sweep_expired_locked(&self, inner: &mut Inner) {
        let ttl = chrono::Duration::seconds(self.config.ttl_seconds as i64);
        let now = Utc::now();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| now.signed_duration_since(e.accessed_at) > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(entry) = inner.entries.remove(&id) {
                let _ = fs::remove_file(&entry.path);
                self.current_size.fetch_sub(entry.size, Ordering::SeqCst);
                tracing::debug!(id, "disk tier: swept expired entry");
            }
        }
    }

    /// Periodic TTL sweep entry point, invoked every 5 minutes by a
    /// background task (spec §4.A) and opportunistically on disk-full.
    pub fn sweep_expired(&self) {
        let mut inner = self.inner.lock();
        self.sweep_expired_locked(&mut inner);
    }

    /// Spawns the standalone periodic TTL sweeper spec §4.A/§5 require,
    /// independent of the opportunistic on-disk-full sweep. Stop it with
    /// `TtlSweeper::stop(sweeper).await`.
    pub fn spawn_ttl_sweeper(self: &Arc<Self>) -> TtlSweeper {
        self.spawn_ttl_sweeper_with_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// As [`Self::spawn_ttl_sweeper`], with a caller-chosen interval —
    /// tests use a short one instead of waiting 5 real minutes.
    pub fn spawn_ttl_sweeper_with_interval(self: &Arc<Self>, interval: std::time::Duration) -> TtlSweeper {
        let store = self.clone();
        TtlSweeper::spawn(interval, move || store.sweep_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_tmp() -> (DiskStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = DiskConfig {
            cache_dir: dir.path().to_path_buf(),
            max_size_bytes: 1024,
            ttl_seconds: 3600,
        };
        (DiskStore::new(config).unwrap(), dir)
    }

    #[test]
    fn store_then_retrieve_round_trips() {
        let (store, _dir) = store_with_tmp();
        store.store("a", b"hello world", "checksum", "text/plain", false, HashMap::new()).unwrap();
        let bytes = store.retrieve("a").unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn retrieve_missing_is_not_found() {
        let (store, _dir) = store_with_tmp();
        assert!(matches!(store.retrieve("missing"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn delete_removes_entry_and_updates_size() {
        let (store, _dir) = store_with_tmp();
        store.store("a", b"12345", "c", "text/plain", false, HashMap::new()).unwrap();
        assert_eq!(store.stats().current_size, 5);
        store.delete("a").unwrap();
        assert_eq!(store.stats().current_size, 0);
        assert!(matches!(store.retrieve("a"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let (store, _dir) = store_with_tmp();
        assert!(matches!(store.delete("missing"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn store_fails_when_disk_full() {
        let (store, _dir) = store_with_tmp();
        let big = vec![0u8; 2048];
        let err = store.store("big", &big, "c", "application/octet-stream", false, HashMap::new());
        assert!(matches!(err, Err(CacheError::DiskFull { .. })));
    }

    #[test]
    fn promote_returns_bytes_and_removes_entry() {
        let (store, _dir) = store_with_tmp();
        store.store("a", b"payload", "c", "text/plain", false, HashMap::new()).unwrap();
        let (bytes, meta) = store.promote("a").unwrap();
        assert_eq!(bytes, b"payload");
        assert_eq!(meta.id, "a");
        assert!(matches!(store.retrieve("a"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn sweep_expired_removes_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiskConfig {
            cache_dir: dir.path().to_path_buf(),
            max_size_bytes: 1024,
            ttl_seconds: 0,
        };
        let store = DiskStore::new(config).unwrap();
        store.store("a", b"x", "c", "text/plain", false, HashMap::new()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        store.sweep_expired();
        assert_eq!(store.stats().item_count, 0);
    }

    #[test]
    fn store_cancelable_precancelled_performs_no_write() {
        let (store, _dir) = store_with_tmp();
        let token = CancellationToken::new();
        token.cancel();
        let err = store
            .store_cancelable(&token, "a", b"payload", "c", "text/plain", false, HashMap::new())
            .unwrap_err();
        assert!(matches!(err, CacheError::Cancelled));
        assert!(matches!(store.retrieve("a"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn store_cancelable_lets_in_progress_write_finish_once_started() {
        let (store, _dir) = store_with_tmp();
        let token = CancellationToken::new();
        let cancel_mid_write = token.clone();
        let err = token
            .guard(|| {
                let result = store.store("a", b"payload", "c", "text/plain", false, HashMap::new());
                cancel_mid_write.cancel();
                result
            })
            .unwrap_err();
        assert!(matches!(err, CacheError::Cancelled));
        // The write already in flight when cancellation landed still completes.
        assert_eq!(store.retrieve("a").unwrap(), b"payload");
    }

    #[test]
    fn retrieve_cancelable_rejects_precancelled_token() {
        let (store, _dir) = store_with_tmp();
        store.store("a", b"x", "c", "text/plain", false, HashMap::new()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            store.retrieve_cancelable(&token, "a"),
            Err(CacheError::Cancelled)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ttl_sweeper_removes_stale_entries_on_its_own() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiskConfig {
            cache_dir: dir.path().to_path_buf(),
            max_size_bytes: 1024,
            ttl_seconds: 0,
        };
        let store = Arc::new(DiskStore::new(config).unwrap());
        store.store("a", b"x", "c", "text/plain", false, HashMap::new()).unwrap();

        let sweeper = store.spawn_ttl_sweeper_with_interval(std::time::Duration::from_millis(20));
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        sweeper.stop().await;

        assert_eq!(store.stats().item_count, 0);
        assert!(matches!(store.retrieve("a"), Err(CacheError::NotFound(_))));
    }
}
