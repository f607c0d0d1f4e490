// The opaque handle passed between cache tiers and callers (spec §3).

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Where a reference's bytes lived at the moment `Store` returned it.
///
/// Callers must not use this to decide how to retrieve the data — `Get`
/// transparently locates the current tier regardless of what `location`
/// says (spec §3 invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Memory,
    Disk,
    Database,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Memory => write!(f, "MEMORY"),
            Location::Disk => write!(f, "DISK"),
            Location::Database => write!(f, "DATABASE"),
        }
    }
}

/// Opaque handle to stored bytes. See spec §3 for field semantics and
/// invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    /// Original, uncompressed size in bytes.
    pub size_bytes: u64,
    pub location: Location,
    /// Hex SHA-256 of the uncompressed original bytes.
    pub checksum: String,
    pub compressed: bool,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub stored_at: DateTime<Utc>,
}

impl Reference {
    /// Validates the structural invariants spec §7 calls out under `Invalid`:
    /// non-empty id, positive size, non-empty checksum.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CacheError::Invalid("reference id is empty".into()));
        }
        if self.size_bytes == 0 {
            return Err(CacheError::Invalid(format!(
                "reference {} has non-positive size",
                self.id
            )));
        }
        if self.checksum.trim().is_empty() {
            return Err(CacheError::Invalid(format!(
                "reference {} has an empty checksum",
                self.id
            )));
        }
        Ok(())
    }

    /// Human-readable form for logs and prompts. The id is never truncated
    /// so downstream prompts can extract it verbatim (spec §6).
    pub fn display_form(&self) -> String {
        format!(
            "DataRef[{}, {}, {} bytes, compressed={}]",
            self.id, self.location, self.size_bytes, self.compressed
        )
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_form())
    }
}
