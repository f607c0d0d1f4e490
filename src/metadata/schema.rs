// Schema inference for the metadata analyzer (spec §4.D). Inference looks
// only at the first item of a collection; iteration order over mapping
// fields is unspecified and tests must not depend on it (spec's own
// determinism note).

use serde_json::{Map, Value};

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn object_fields(obj: &Map<String, Value>) -> Value {
    let fields: Vec<Value> = obj
        .iter()
        .map(|(name, v)| {
            serde_json::json!({ "name": name, "type": json_type_name(v) })
        })
        .collect();
    Value::Array(fields)
}

/// `{type: "array", item_count, fields (from first item if object), sample_item}`.
pub fn array_schema(items: &[Value]) -> Value {
    let mut schema = serde_json::json!({
        "type": "array",
        "item_count": items.len(),
    });
    if let Some(first) = items.first() {
        schema["sample_item"] = first.clone();
        if let Value::Object(obj) = first {
            schema["fields"] = object_fields(obj);
        }
    }
    schema
}

/// `{type: "object", fields: [{name, type}]}`.
pub fn object_schema(obj: &Map<String, Value>) -> Value {
    serde_json::json!({
        "type": "object",
        "fields": object_fields(obj),
    })
}

/// `{type: "table", item_count = lines-1, columns}`.
pub fn csv_schema(columns: &[String], data_row_count: usize) -> Value {
    serde_json::json!({
        "type": "table",
        "item_count": data_row_count,
        "columns": columns,
    })
}

/// `{type: "text", item_count = line count}`.
pub fn text_schema(line_count: usize) -> Value {
    serde_json::json!({
        "type": "text",
        "item_count": line_count,
    })
}

/// Non-UTF8 bytes get no structural schema beyond their size (spec §6:
/// `application/octet-stream` carries no array/object/table/text shape).
pub fn binary_schema(size_bytes: usize) -> Value {
    serde_json::json!({
        "type": "binary",
        "size_bytes": size_bytes,
    })
}
