pub mod candidates;
pub mod documents;
pub mod faqs;
pub mod rich_text;

use serde_json::Value;

/// True for the JSON values the upstream API uses as "nothing here":
/// null, empty string, empty array, empty object. Numbers and booleans
/// always count as present.
pub(crate) fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

// ── Tests ──
