// # Metadata / progressive-disclosure layer
//
// Pure, side-effect-free inspection of already-stored bytes (spec §4.D):
// content-type classification, schema inference, and bounded previews so
// agents can inspect a result's shape before fetching it in full.

pub mod preview;
pub mod schema;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::config::MemoryConfig;
use crate::memory::MemoryCache;
use crate::reference::{Location, Reference};

#[derive(Debug, Clone)]
pub struct MetadataRecord {
    pub id: String,
    pub content_type: String,
    pub data_type: String,
    pub size_bytes: u64,
    pub estimated_tokens: u64,
    pub schema: Value,
    pub preview: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub location: Location,
}

enum Detected {
    JsonArray(Vec<Value>),
    JsonObject(serde_json::Map<String, Value>),
    Csv {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Text {
        lines: Vec<String>,
    },
    /// Not valid UTF-8 text: classified `application/octet-stream` rather
    /// than forced through the text path (spec §6's content-type list).
    Binary {
        size_bytes: usize,
    },
}

/// Detects content type in the order spec §4.D documents: JSON array, JSON
/// object, CSV (by header/consistency check), else plain text; bytes that
/// aren't valid UTF-8 at all are classified as binary (spec §6).
fn detect(bytes: &[u8]) -> Detected {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if let Ok(parsed) = serde_json::from_str::<Value>(text) {
            match parsed {
                Value::Array(items) => return Detected::JsonArray(items),
                Value::Object(obj) => return Detected::JsonObject(obj),
                _ => {}
            }
        }
        if let Some((columns, rows)) = try_parse_csv(text) {
            return Detected::Csv { columns, rows };
        }
        let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
        return Detected::Text { lines };
    }
    Detected::Binary {
        size_bytes: bytes.len(),
    }
}

/// Consistency check: a header row plus at least one data row with the
/// same comma-separated field count as the header.
fn try_parse_csv(text: &str) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let mut lines = text.lines();
    let header_line = lines.next()?;
    if !header_line.contains(',') {
        return None;
    }
    let columns: Vec<String> = header_line.split(',').map(|c| c.trim().to_string()).collect();
    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<String> = line.split(',').map(|c| c.trim().to_string()).collect();
        if fields.len() != columns.len() {
            return None;
        }
        rows.push(fields);
    }
    if rows.is_empty() {
        return None;
    }
    Some((columns, rows))
}

fn content_type_for(detected: &Detected) -> &'static str {
    match detected {
        Detected::JsonArray(_) | Detected::JsonObject(_) => "application/json",
        Detected::Csv { .. } => "text/csv",
        Detected::Text { .. } => "text/plain",
        Detected::Binary { .. } => "application/octet-stream",
    }
}

fn rows_to_json(rows: &[Vec<String>]) -> Vec<Value> {
    rows.iter()
        .map(|row| Value::Array(row.iter().map(|c| Value::String(c.clone())).collect()))
        .collect()
}

/// Pure function from detected content to `(schema, preview)`.
fn schema_and_preview(detected: &Detected) -> (Value, Value) {
    match detected {
        Detected::JsonArray(items) => {
            let schema = schema::array_schema(items);
            let preview = preview::windowed_preview(items);
            (schema, preview)
        }
        Detected::JsonObject(obj) => {
            let schema = schema::object_schema(obj);
            let preview = preview::object_preview(&Value::Object(obj.clone()));
            (schema, preview)
        }
        Detected::Csv { columns, rows } => {
            let schema = schema::csv_schema(columns, rows.len());
            let preview = preview::windowed_preview(&rows_to_json(rows));
            (schema, preview)
        }
        Detected::Text { lines } => {
            let schema = schema::text_schema(lines.len());
            let preview = preview::windowed_text_preview(lines);
            (schema, preview)
        }
        Detected::Binary { size_bytes } => {
            let schema = schema::binary_schema(*size_bytes);
            (schema, Value::Null)
        }
    }
}

/// Computes metadata for `reference`, fetching its bytes through the
/// memory tier (so this read counts against tier-B hit/miss stats, per
/// spec §4.D).
pub fn get_metadata(memory: &Arc<MemoryCache>, config: &MemoryConfig, reference: &Reference) -> crate::error::Result<MetadataRecord> {
    let bytes = memory.get(reference)?;
    let detected = detect(&bytes);
    let (schema, preview) = schema_and_preview(&detected);
    let data_type = match &schema["type"] {
        Value::String(s) => s.clone(),
        _ => "unknown".to_string(),
    };

    let created_at = reference.stored_at;
    let expires_at = created_at + Duration::seconds(config.ttl_seconds as i64);

    Ok(MetadataRecord {
        id: reference.id.clone(),
        content_type: content_type_for(&detected).to_string(),
        data_type,
        size_bytes: reference.size_bytes,
        estimated_tokens: reference.size_bytes / 4,
        schema,
        preview,
        created_at,
        expires_at,
        location: reference.location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn memory() -> Arc<MemoryCache> {
        Arc::new(MemoryCache::new(MemoryConfig::default()))
    }

    #[test]
    fn detects_json_array() {
        let mem = memory();
        let reference = mem
            .store("a", b"[1,2,3]", "application/json", HashMap::new())
            .unwrap();
        let meta = get_metadata(&mem, &MemoryConfig::default(), &reference).unwrap();
        assert_eq!(meta.content_type, "application/json");
        assert_eq!(meta.data_type, "array");
        assert_eq!(meta.schema["item_count"], 3);
    }

    #[test]
    fn detects_json_object() {
        let mem = memory();
        let reference = mem
            .store("a", br#"{"x": 1}"#, "application/json", HashMap::new())
            .unwrap();
        let meta = get_metadata(&mem, &MemoryConfig::default(), &reference).unwrap();
        assert_eq!(meta.data_type, "object");
    }

    #[test]
    fn detects_csv() {
        let mem = memory();
        let csv = "id,name\n1,Alice\n2,Bob\n3,Charlie\n4,Dan\n5,Eve\n";
        let reference = mem.store("a", csv.as_bytes(), "text/csv", HashMap::new()).unwrap();
        let meta = get_metadata(&mem, &MemoryConfig::default(), &reference).unwrap();
        assert_eq!(meta.content_type, "text/csv");
        assert_eq!(meta.data_type, "table");
        assert_eq!(meta.preview["first5"].as_array().unwrap().len(), 5);
        assert!(meta.preview["last5"].as_array().unwrap().is_empty());
    }

    #[test]
    fn detects_plain_text() {
        let mem = memory();
        let reference = mem
            .store("a", b"just some plain text\nwith two lines", "text/plain", HashMap::new())
            .unwrap();
        let meta = get_metadata(&mem, &MemoryConfig::default(), &reference).unwrap();
        assert_eq!(meta.content_type, "text/plain");
        assert_eq!(meta.data_type, "text");
    }

    #[test]
    fn detects_binary_as_octet_stream() {
        let mem = memory();
        let non_utf8 = vec![0xffu8, 0xfe, 0x00, 0x01, 0x02];
        let reference = mem
            .store("a", &non_utf8, "application/octet-stream", HashMap::new())
            .unwrap();
        let meta = get_metadata(&mem, &MemoryConfig::default(), &reference).unwrap();
        assert_eq!(meta.content_type, "application/octet-stream");
        assert_eq!(meta.data_type, "binary");
        assert_eq!(meta.schema["size_bytes"], non_utf8.len());
    }

    #[test]
    fn estimated_tokens_is_size_divided_by_four() {
        let mem = memory();
        let reference = mem.store("a", &vec![0u8; 400], "x", HashMap::new()).unwrap();
        let meta = get_metadata(&mem, &MemoryConfig::default(), &reference).unwrap();
        assert_eq!(meta.estimated_tokens, 100);
    }
}
