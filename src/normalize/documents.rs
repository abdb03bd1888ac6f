use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::normalize::is_vacant;
use crate::normalize::rich_text::extract_text;

/// Matches a leading "1. " style ordinal, which the CMS bakes into some
/// document names.
static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").unwrap());

/// Extracts the required-document names from a `/documents` payload.
///
/// The payload nests per-language content under `data.en` / `data.hi`
/// (English preferred), with the actual names buried in rich-text blocks
/// under `documents_required`. Anything malformed degrades to an empty
/// list rather than an error.
pub fn normalize_documents(payload: Option<&Value>) -> Vec<String> {
    let Some(payload) = payload else {
        return Vec::new();
    };
    let data = payload.get("data");
    let Some(content) = ["en", "hi"]
        .iter()
        .find_map(|lang| data.and_then(|d| d.get(*lang)).filter(|v| !is_vacant(v)))
    else {
        return Vec::new();
    };
    let Some(blocks) = content.get("documents_required").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut documents = Vec::new();
    for block in blocks {
        let Some(children) = block.get("children").and_then(Value::as_array) else {
            continue;
        };
        for child in children {
            let text = extract_text(child);
            if !text.is_empty() {
                documents.push(LIST_MARKER_RE.replace(&text, "").into_owned());
            }
        }
    }
    documents
}

// ── Tests ──
