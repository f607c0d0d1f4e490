// Session reference tracker (spec §4.C): a per-session pin set that keeps
// live references from being evicted and releases them in bulk at session
// end. The tracker never inspects the memory tier's internals; it only
// increments/decrements the ref-count it doesn't own (spec §9).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::memory::MemoryCache;

#[derive(Debug, Clone, Copy, Default)]
pub struct TrackerStats {
    pub session_count: usize,
    pub total_refs: usize,
}

/// Maps `session_id -> ordered-unique list of id` (spec §3).
pub struct SessionTracker {
    memory: Arc<MemoryCache>,
    sessions: RwLock<HashMap<String, Vec<String>>>,
}

impl SessionTracker {
    pub fn new(memory: Arc<MemoryCache>) -> Self {
        Self {
            memory,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Pins `id` for `session_id`. No-op if either is empty or the id is
    /// already pinned for this session.
    pub fn pin_for_session(&self, session_id: &str, id: &str) {
        if session_id.trim().is_empty() || id.trim().is_empty() {
            return;
        }
        let mut sessions = self.sessions.write();
        let ids = sessions.entry(session_id.to_string()).or_default();
        if ids.iter().any(|existing| existing == id) {
            return;
        }
        ids.push(id.to_string());
        drop(sessions);
        self.memory.increment_ref_count(id);
    }

    /// Releases every id pinned for `session_id` and forgets the session.
    /// Returns the number of ids released. Idempotent: a repeated call
    /// returns 0.
    pub fn unpin_session(&self, session_id: &str) -> usize {
        let ids = {
            let mut sessions = self.sessions.write();
            sessions.remove(session_id).unwrap_or_default()
        };
        for id in &ids {
            self.memory.release(id);
        }
        ids.len()
    }

    /// Returns a defensive copy — external mutation must not leak into the
    /// tracker.
    pub fn get_session_references(&self, session_id: &str) -> Vec<String> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn stats(&self) -> TrackerStats {
        let sessions = self.sessions.read();
        TrackerStats {
            session_count: sessions.len(),
            total_refs: sessions.values().map(|v| v.len()).sum(),
        }
    }
}
