// Tunables for each tier, with the defaults spec §4.A/§4.B document and an
// env-driven constructor for the global singleton (spec §4.F, §6).

use crate::error::{CacheError, Result};

const DEFAULT_MEMORY_MAX_BYTES: u64 = 1024 * 1024 * 1024; // 1 GiB
const DEFAULT_COMPRESSION_THRESHOLD: u64 = 1024 * 1024; // 1 MiB
const DEFAULT_TTL_SECONDS: u64 = 3600; // 1 hour
const DEFAULT_DISK_MAX_BYTES: u64 = 10 * 1024 * 1024 * 1024; // 10 GiB
const DEFAULT_DISK_TTL_SECONDS: u64 = 3600; // 1 hour

/// Configuration for the in-memory tier (§4.B).
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub max_size_bytes: u64,
    pub compression_threshold_bytes: u64,
    pub ttl_seconds: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MEMORY_MAX_BYTES,
            compression_threshold_bytes: DEFAULT_COMPRESSION_THRESHOLD,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(CacheError::Invalid(
                "max_size_bytes must be greater than 0".to_string(),
            ));
        }
        if self.ttl_seconds == 0 {
            return Err(CacheError::Invalid(
                "ttl_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the disk overflow tier (§4.A).
#[derive(Debug, Clone)]
pub struct DiskConfig {
    pub cache_dir: std::path::PathBuf,
    pub max_size_bytes: u64,
    pub ttl_seconds: u64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("loom").join("cache"),
            max_size_bytes: DEFAULT_DISK_MAX_BYTES,
            ttl_seconds: DEFAULT_DISK_TTL_SECONDS,
        }
    }
}

impl DiskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(CacheError::Invalid(
                "max_size_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the structured-result store (§4.E).
#[derive(Debug, Clone)]
pub struct ResultStoreConfig {
    pub database_path: std::path::PathBuf,
    pub ttl_seconds: u64,
}

impl Default for ResultStoreConfig {
    fn default() -> Self {
        Self {
            database_path: std::env::temp_dir().join("loom").join("results.sqlite3"),
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

/// Reads the environment knobs named in spec §6, falling back to defaults.
/// Consumed only by the global singleton — any other caller should build
/// configs directly.
pub fn memory_config_from_env() -> MemoryConfig {
    let mut cfg = MemoryConfig::default();
    if let Ok(v) = std::env::var("LOOM_MEMORY_BYTES") {
        if let Ok(n) = v.parse() {
            cfg.max_size_bytes = n;
        }
    }
    if let Ok(v) = std::env::var("LOOM_COMPRESSION_THRESHOLD") {
        if let Ok(n) = v.parse() {
            cfg.compression_threshold_bytes = n;
        }
    }
    if let Ok(v) = std::env::var("LOOM_TTL_SECONDS") {
        if let Ok(n) = v.parse() {
            cfg.ttl_seconds = n;
        }
    }
    cfg
}

pub fn disk_config_from_env() -> DiskConfig {
    let mut cfg = DiskConfig::default();
    if let Ok(dir) = std::env::var("LOOM_CACHE_DIR") {
        cfg.cache_dir = std::path::PathBuf::from(dir);
    } else if let Ok(home) = std::env::var("HOME") {
        cfg.cache_dir = std::path::PathBuf::from(home)
            .join(".loom")
            .join("tool_results");
    }
    if let Ok(v) = std::env::var("LOOM_DISK_BYTES") {
        if let Ok(n) = v.parse() {
            cfg.max_size_bytes = n;
        }
    }
    if let Ok(v) = std::env::var("LOOM_TTL_SECONDS") {
        if let Ok(n) = v.parse() {
            cfg.ttl_seconds = n;
        }
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_config_default_is_valid() {
        assert!(MemoryConfig::default().validate().is_ok());
    }

    #[test]
    fn memory_config_rejects_zero_size() {
        let mut cfg = MemoryConfig::default();
        cfg.max_size_bytes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn disk_config_default_is_valid() {
        assert!(DiskConfig::default().validate().is_ok());
    }
}
