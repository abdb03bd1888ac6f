use std::collections::{HashSet, VecDeque};

use serde_json::Value;

/// Only the first few elements of a list are inspected when deciding
/// whether it looks like a record list.
const SAMPLE_WINDOW: usize = 5;

/// Breadth-first search for lists of records anywhere inside `root`.
///
/// A list qualifies when any object among its first [`SAMPLE_WINDOW`]
/// elements carries at least one of `keys`. The whole list is returned,
/// unqualified elements included. Lists are returned in discovery order,
/// shallowest first, and a visited set keyed on node identity keeps the
/// walk from ever looping.
pub fn find_candidate_lists<'a>(root: &'a Value, keys: &[&str]) -> Vec<&'a [Value]> {
    let mut found: Vec<&'a [Value]> = Vec::new();
    let mut queue: VecDeque<&'a Value> = VecDeque::new();
    let mut visited: HashSet<*const Value> = HashSet::new();
    queue.push_back(root);

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node as *const Value) {
            continue;
        }
        match node {
            Value::Array(items) => {
                let matches = items
                    .iter()
                    .take(SAMPLE_WINDOW)
                    .filter_map(Value::as_object)
                    .any(|record| keys.iter().any(|key| record.contains_key(*key)));
                if matches {
                    found.push(items.as_slice());
                }
                for item in items {
                    if item.is_object() || item.is_array() {
                        queue.push_back(item);
                    }
                }
            }
            Value::Object(map) => {
                for value in map.values() {
                    if value.is_object() || value.is_array() {
                        queue.push_back(value);
                    }
                }
            }
            _ => {}
        }
    }
    found
}

// ── Tests ──
