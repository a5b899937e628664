//! TOON output encoding.
//!
//! A compact columnar rendering for uniform row lists: a count-and-header
//! line followed by one comma-separated value row per record.  Non-uniform
//! values fall back to sensible line-oriented forms so the encoder never
//! fails.

use serde_json::Value;

/// Encode a normalized result value.
pub fn encode(value: &Value) -> String {
    match value {
        Value::Array(items) => encode_array(items),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", scalar(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => scalar(other),
    }
}

fn encode_array(items: &[Value]) -> String {
    if let Some(fields) = uniform_fields(items) {
        let mut out = format!("[{}]{{{}}}:", items.len(), fields.join(","));
        for item in items {
            let row: Vec<String> = fields
                .iter()
                .map(|f| scalar(item.get(f.as_str()).unwrap_or(&Value::Null)))
                .collect();
            out.push_str("\n  ");
            out.push_str(&row.join(","));
        }
        return out;
    }

    let mut out = format!("[{}]:", items.len());
    for item in items {
        out.push_str("\n  ");
        out.push_str(&scalar(item));
    }
    out
}

/// Field names shared by every element, in first-row order, when the array
/// is a non-empty uniform list of flat objects.
fn uniform_fields(items: &[Value]) -> Option<Vec<String>> {
    let first = items.first()?.as_object()?;
    let fields: Vec<String> = first.keys().cloned().collect();
    for item in items {
        let object = item.as_object()?;
        if object.len() != fields.len() || !fields.iter().all(|f| object.contains_key(f)) {
            return None;
        }
    }
    Some(fields)
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            if s.contains(',') || s.contains('\n') || s.contains('"') {
                format!("\"{}\"", s.replace('"', "\"\""))
            } else {
                s.clone()
            }
        }
        // Nested structures stay inline JSON inside a cell.
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tabular_for_uniform_rows() {
        let rows = json!([
            {"store_name": "Store A", "total_sales": 120.5},
            {"store_name": "Store B", "total_sales": 80},
        ]);
        assert_eq!(
            encode(&rows),
            "[2]{store_name,total_sales}:\n  Store A,120.5\n  Store B,80"
        );
    }

    #[test]
    fn quotes_cells_with_separators() {
        let rows = json!([{"note": "a,b"}]);
        assert_eq!(encode(&rows), "[1]{note}:\n  \"a,b\"");
    }

    #[test]
    fn mixed_array_falls_back_to_lines() {
        let rows = json!([1, "two", {"x": 3}]);
        assert_eq!(encode(&rows), "[3]:\n  1\n  two\n  {\"x\":3}");
    }

    #[test]
    fn object_renders_key_value_lines() {
        let value = json!({"status": "ok", "count": 2});
        assert_eq!(encode(&value), "status: ok\ncount: 2");
    }

    #[test]
    fn scalars_coerce_to_text() {
        assert_eq!(encode(&json!("hi")), "hi");
        assert_eq!(encode(&json!(3.5)), "3.5");
        assert_eq!(encode(&Value::Null), "null");
    }

    #[test]
    fn empty_array_has_header_only() {
        assert_eq!(encode(&json!([])), "[0]:");
    }

    #[test]
    fn rows_with_missing_field_fall_back() {
        let rows = json!([{"a": 1}, {"b": 2}]);
        assert!(encode(&rows).starts_with("[2]:"));
    }
}
