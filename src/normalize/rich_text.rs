use serde_json::Value;

/// Flattens a MyScheme rich-text node into plain text.
///
/// The CMS serialises formatted copy as nested `{align, children: [{text}]}`
/// trees with no fixed depth. This walks whatever shape shows up: `text`
/// leaves win over everything else, `children` are recursed, sibling block
/// nodes are joined with newlines and unknown object values with spaces.
pub fn extract_text(node: &Value) -> String {
    match node {
        Value::Null => String::new(),
        Value::String(text) => text.trim().to_string(),
        Value::Object(map) => {
            if let Some(leaf) = map.get("text") {
                return leaf.as_str().unwrap_or_default().trim().to_string();
            }
            if let Some(children) = map.get("children") {
                return extract_text(children);
            }
            let parts: Vec<String> = map.values().map(extract_text).collect();
            parts.join(" ").trim().to_string()
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(extract_text).collect();
            parts.join("\n").trim().to_string()
        }
        other => other.to_string().trim().to_string(),
    }
}

// ── Tests ──
