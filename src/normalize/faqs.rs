use serde::Serialize;
use serde_json::{Map, Value};

use crate::normalize::candidates::find_candidate_lists;
use crate::normalize::is_vacant;
use crate::normalize::rich_text::extract_text;

/// Question aliases, probed in order, for records found in lists.
const QUESTION_KEYS: &[&str] = &["question", "faqQuestion", "q", "faq"];
/// Answer aliases, probed in order, for records found in lists.
const ANSWER_KEYS: &[&str] = &["answer", "faqAnswer", "a"];
/// Keys that mark a list as holding FAQ records during the deep search.
const RECORD_KEYS: &[&str] = &["question", "faqQuestion", "faq", "answer", "faqAnswer"];
/// Wrapper keys tried, in order, when the deep search comes up empty.
const FALLBACK_CONTAINER_KEYS: &[&str] = &["faqs", "faq", "questions", "data"];
/// Narrower alias sets used on records pulled out of a fallback wrapper.
const FALLBACK_QUESTION_KEYS: &[&str] = &["question", "faqQuestion"];
const FALLBACK_ANSWER_KEYS: &[&str] = &["answer", "faqAnswer"];

/// One question/answer pair, serialised with the short wire keys the
/// frontend expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaqEntry {
    #[serde(rename = "q")]
    pub question: String,
    #[serde(rename = "a")]
    pub answer: String,
}

/// Normalises a `/faqs` payload into question/answer pairs.
///
/// The upstream API has shipped this payload in several shapes over time:
/// a bare list of records, records wrapped somewhere under `data`, and
/// flat wrapper objects keyed `faqs`/`faq`/`questions`/`data`. Each shape
/// is tried in turn; whatever cannot be recognised yields an empty list.
pub fn normalize_faqs(payload: Option<&Value>) -> Vec<FaqEntry> {
    let Some(payload) = payload else {
        return Vec::new();
    };
    let candidate = match payload.get("data") {
        Some(data) if data.is_array() || data.is_object() => data,
        _ => payload,
    };

    if let Value::Array(items) = candidate {
        return items.iter().filter_map(entry_from_item).collect();
    }

    let mut faqs = Vec::new();
    if candidate.is_object() {
        for list in find_candidate_lists(candidate, RECORD_KEYS) {
            for item in list {
                if let Value::Object(record) = item {
                    faqs.push(entry_from_record(record));
                }
            }
        }
        if faqs.is_empty() {
            faqs = fallback_entries(candidate);
        }
    }
    faqs
}

fn entry_from_item(item: &Value) -> Option<FaqEntry> {
    match item {
        Value::Object(record) => Some(entry_from_record(record)),
        Value::String(question) => Some(FaqEntry {
            question: question.clone(),
            answer: String::new(),
        }),
        _ => None,
    }
}

fn entry_from_record(record: &Map<String, Value>) -> FaqEntry {
    FaqEntry {
        question: alias_text(record, QUESTION_KEYS),
        answer: alias_text(record, ANSWER_KEYS),
    }
}

/// Last-resort pass over known wrapper keys. Only the first key whose
/// value is a list is consumed, only object elements contribute, and
/// rich-text values are kept raw rather than flattened.
fn fallback_entries(candidate: &Value) -> Vec<FaqEntry> {
    let Some(list) = FALLBACK_CONTAINER_KEYS
        .iter()
        .find_map(|key| candidate.get(*key).and_then(Value::as_array))
    else {
        return Vec::new();
    };
    list.iter()
        .filter_map(Value::as_object)
        .map(|record| FaqEntry {
            question: raw_alias_text(record, FALLBACK_QUESTION_KEYS),
            answer: raw_alias_text(record, FALLBACK_ANSWER_KEYS),
        })
        .collect()
}

/// First non-vacant alias, with rich-text containers flattened to text.
fn alias_text(record: &Map<String, Value>, keys: &[&str]) -> String {
    match first_non_vacant(record, keys) {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(node @ (Value::Object(_) | Value::Array(_))) => extract_text(node),
        Some(other) => other.to_string(),
    }
}

/// First non-vacant alias rendered as-is, containers included.
fn raw_alias_text(record: &Map<String, Value>, keys: &[&str]) -> String {
    match first_non_vacant(record, keys) {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn first_non_vacant<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| record.get(*key).filter(|value| !is_vacant(value)))
}

// ── Tests ──
