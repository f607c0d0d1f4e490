// Disk overflow tier and progressive-disclosure metadata, exercised across
// module boundaries the way an orchestrator actually uses them together:
// store through the memory tier, inspect through the metadata layer.

use std::collections::HashMap;
use std::sync::Arc;

use loom_cache::{get_metadata, DiskConfig, DiskStore, MemoryCache, MemoryConfig};

fn temp_disk_config() -> DiskConfig {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("overflow");
    std::mem::forget(dir); // keep the directory alive for the test's duration
    DiskConfig {
        cache_dir,
        max_size_bytes: 10 * 1024 * 1024,
        ttl_seconds: 3600,
    }
}

#[test]
fn disk_store_round_trips_bytes_with_checksum_and_metadata() {
    let store = DiskStore::new(temp_disk_config()).unwrap();
    let payload = b"structured tool output".to_vec();
    let mut meta = HashMap::new();
    meta.insert("source".to_string(), "tool-call-42".to_string());

    store
        .store("r1", &payload, "checksum-abc", "text/plain", false, meta.clone())
        .unwrap();

    let fetched = store.retrieve("r1").unwrap();
    assert_eq!(fetched, payload);

    let entry = store.metadata("r1").unwrap();
    assert_eq!(entry.checksum, "checksum-abc");
    assert_eq!(entry.metadata.get("source"), Some(&"tool-call-42".to_string()));
}

#[test]
fn disk_store_promote_returns_bytes_and_removes_entry() {
    let store = DiskStore::new(temp_disk_config()).unwrap();
    let payload = b"evicted from memory".to_vec();
    store
        .store("r2", &payload, "sum", "text/plain", false, HashMap::new())
        .unwrap();

    let (bytes, meta) = store.promote("r2").unwrap();
    assert_eq!(bytes, payload);
    assert_eq!(meta.id, "r2");
    assert!(store.retrieve("r2").is_err());
}

#[test]
fn json_array_preview_matches_spec_boundary() {
    let memory = Arc::new(MemoryCache::new(MemoryConfig::default()));
    let items: Vec<serde_json::Value> = (0..15).map(serde_json::Value::from).collect();
    let payload = serde_json::to_vec(&serde_json::Value::Array(items)).unwrap();

    let reference = memory
        .store("arr", &payload, "application/json", HashMap::new())
        .unwrap();
    let record = get_metadata(&memory, &MemoryConfig::default(), &reference).unwrap();

    let first5 = record.preview["first5"].as_array().unwrap();
    let last5 = record.preview["last5"].as_array().unwrap();
    assert_eq!(first5.len(), 5);
    assert_eq!(last5.len(), 5);
    assert_eq!(first5[0], serde_json::Value::from(0));
    assert_eq!(last5[4], serde_json::Value::from(14));
}

#[test]
fn csv_preview_with_five_rows_has_no_last5() {
    let memory = Arc::new(MemoryCache::new(MemoryConfig::default()));
    let csv = "a,b\n1,2\n3,4\n5,6\n7,8\n9,10\n";
    let reference = memory
        .store("csv", csv.as_bytes(), "text/csv", HashMap::new())
        .unwrap();
    let record = get_metadata(&memory, &MemoryConfig::default(), &reference).unwrap();

    let first5 = record.preview["first5"].as_array().unwrap();
    let last5 = record.preview["last5"].as_array().unwrap();
    assert_eq!(first5.len(), 5);
    assert!(last5.is_empty());
}

#[test]
fn object_preview_over_20000_chars_is_truncated() {
    let memory = Arc::new(MemoryCache::new(MemoryConfig::default()));
    let big_value = "x".repeat(30_000);
    let object = serde_json::json!({ "blob": big_value });
    let payload = serde_json::to_vec(&object).unwrap();

    let reference = memory
        .store("obj", &payload, "application/json", HashMap::new())
        .unwrap();
    let record = get_metadata(&memory, &MemoryConfig::default(), &reference).unwrap();

    let preview_str = record.preview.to_string();
    assert!(preview_str.len() <= 20_000 + 256); // small slack for marker/braces
    assert!(record.preview.get("_truncated").is_some() || preview_str.contains("_truncated"));
}
