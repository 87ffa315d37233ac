use serde_json::Value;

/// An approximate, deterministic byte-size estimate for a document.
///
/// Mirrors the source's `get_size`: scalars contribute a fixed per-type
/// weight, objects contribute the sum of their values' sizes. This crate
/// additionally recurses into JSON arrays — the source only ever saw
/// Python `dict`/scalar payloads and never defined array behavior, so this
/// fills a silent gap rather than changing anything the source specified.
pub fn estimated_size(doc: &Value) -> u64 {
    match doc {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                8
            } else {
                8
            }
        }
        Value::String(s) => s.len() as u64,
        Value::Array(items) => items.iter().map(estimated_size).sum(),
        Value::Object(map) => map.values().map(estimated_size).sum(),
    }
}
