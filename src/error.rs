// Error types for the data-reference cache.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("expired: {0}")]
    Expired(String),

    #[error("checksum mismatch for {id}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("no capacity: {0}")]
    NoCapacity(String),

    #[error("disk full: current {current} + incoming {incoming} exceeds max {max}")]
    DiskFull {
        current: u64,
        incoming: u64,
        max: u64,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid: {0}")]
    Invalid(String),

    #[error("corrupted: {0}")]
    Corrupted(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Database(e.to_string())
    }
}

impl CacheError {
    /// Collapses NotFound/Expired/Corrupted into the single "stale reference"
    /// outcome an RPC boundary surfaces to callers (spec §7).
    pub fn is_stale_reference(&self) -> bool {
        matches!(
            self,
            CacheError::NotFound(_) | CacheError::Expired(_) | CacheError::Corrupted(_)
        )
    }
}
