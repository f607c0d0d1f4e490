// Bounded preview generation for the metadata analyzer (spec §4.D).
//
// Arrays/CSV rows/text lines share one first-N/last-N windowing rule with
// an overlap guard: `last5` is only emitted when there are more than 10
// items, so a 5-item input doesn't show the same items twice.

use serde_json::Value;

pub const OBJECT_PREVIEW_CHAR_BUDGET: usize = 20_000;

/// Returns `{"first5": [...], "last5": [...]}` with the overlap guard.
pub fn windowed_preview(items: &[Value]) -> Value {
    let n = items.len();
    let first_n = n.min(5);
    let first5: Vec<Value> = items[..first_n].to_vec();
    let last5: Vec<Value> = if n > 10 {
        items[n - 5..].to_vec()
    } else {
        Vec::new()
    };
    serde_json::json!({ "first5": first5, "last5": last5 })
}

pub fn windowed_text_preview(lines: &[String]) -> Value {
    let items: Vec<Value> = lines.iter().map(|l| Value::String(l.clone())).collect();
    windowed_preview(&items)
}

/// Truncates a single JSON object so its serialized form stays within
/// `OBJECT_PREVIEW_CHAR_BUDGET` characters, recursing into nested strings,
/// arrays, and objects, tagging the result with `_truncated` when any
/// shrinking occurred.
pub fn object_preview(value: &Value) -> Value {
    let full = serde_json::to_string(value).unwrap_or_default();
    if full.chars().count() <= OBJECT_PREVIEW_CHAR_BUDGET {
        return value.clone();
    }
    let mut remaining = OBJECT_PREVIEW_CHAR_BUDGET;
    let truncated = truncate_value(value, &mut remaining);
    match truncated {
        Value::Object(mut map) => {
            map.insert("_truncated".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        other => other,
    }
}

/// Walks `value`, spending from a single running `remaining` budget shared
/// across every string, array element, and object field — not a budget
/// pre-divided by field count. A fixed per-item share (as `budget / len`)
/// still blows past the cap once `len` is large enough to round the share
/// below a minimum; a running counter can't overspend because every byte
/// kept is subtracted from the same pool before the next item is visited.
/// Fields/elements encountered after the budget hits zero are dropped
/// entirely rather than given a token allowance.
fn truncate_value(value: &Value, remaining: &mut usize) -> Value {
    match value {
        Value::String(s) => {
            let char_count = s.chars().count();
            if char_count <= *remaining {
                *remaining -= char_count;
                Value::String(s.clone())
            } else {
                let keep = remaining.saturating_sub(3);
                let kept: String = s.chars().take(keep).collect();
                *remaining = 0;
                Value::String(format!("{kept}..."))
            }
        }
        Value::Array(arr) => {
            let mut out = Vec::new();
            for v in arr {
                if *remaining == 0 {
                    break;
                }
                out.push(truncate_value(v, remaining));
            }
            Value::Array(out)
        }
        Value::Object(obj) => {
            let mut out = serde_json::Map::new();
            for (k, v) in obj {
                if *remaining == 0 {
                    break;
                }
                *remaining = remaining.saturating_sub(k.chars().count());
                out.insert(k.clone(), truncate_value(v, remaining));
            }
            Value::Object(out)
        }
        other => {
            let size = serde_json::to_string(other)
                .map(|s| s.chars().count())
                .unwrap_or(0);
            *remaining = remaining.saturating_sub(size);
            other.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifteen_item_array_preview_matches_spec_example() {
        let items: Vec<Value> = (0..15).map(Value::from).collect();
        let preview = windowed_preview(&items);
        let first5 = preview["first5"].as_array().unwrap();
        let last5 = preview["last5"].as_array().unwrap();
        assert_eq!(first5.len(), 5);
        assert_eq!(last5.len(), 5);
        assert_eq!(first5[0], Value::from(0));
        assert_eq!(last5[4], Value::from(14));
    }

    #[test]
    fn five_row_csv_preview_has_no_last5() {
        let items: Vec<Value> = (0..5).map(Value::from).collect();
        let preview = windowed_preview(&items);
        assert_eq!(preview["first5"].as_array().unwrap().len(), 5);
        assert!(preview["last5"].as_array().unwrap().is_empty());
    }

    #[test]
    fn object_preview_stays_under_budget() {
        let big_string = "x".repeat(100_000);
        let value = serde_json::json!({ "payload": big_string, "id": 1 });
        let preview = object_preview(&value);
        let serialized = serde_json::to_string(&preview).unwrap();
        assert!(serialized.chars().count() <= OBJECT_PREVIEW_CHAR_BUDGET + 200);
        assert_eq!(preview["_truncated"], Value::Bool(true));
    }

    #[test]
    fn object_preview_with_many_small_fields_stays_under_budget() {
        // A fixed per-field floor (e.g. `.max(16)`) blows past the budget
        // once there are enough fields that `budget / len` would otherwise
        // round below the floor; a running budget must not.
        let mut map = serde_json::Map::new();
        for i in 0..2000 {
            map.insert(format!("field_{i}"), Value::String("x".repeat(50)));
        }
        let value = Value::Object(map);
        let preview = object_preview(&value);
        let serialized = serde_json::to_string(&preview).unwrap();
        assert!(serialized.chars().count() <= OBJECT_PREVIEW_CHAR_BUDGET + 200);
        assert_eq!(preview["_truncated"], Value::Bool(true));
    }

    #[test]
    fn small_object_is_untouched() {
        let value = serde_json::json!({ "a": 1, "b": "small" });
        let preview = object_preview(&value);
        assert_eq!(preview, value);
    }
}
