//! Attribute lookup and value helpers shared by the evaluators.

use serde_json::Value;

/// Resolve a dot-separated `path` (e.g. `"profile.address.city"`) inside `root`.
///
/// Returns `None` as soon as a segment is missing or the current value is not
/// an object. An exact top-level key match wins over path splitting, so keys
/// that themselves contain dots stay addressable.
pub fn get_nested_value<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    if let Some(direct) = root.as_object().and_then(|obj| obj.get(path)) {
        return Some(direct);
    }
    path.split('.')
        .try_fold(root, |current, key| current.as_object()?.get(key))
}

/// Same as [`get_nested_value`] but rooted at a JSON object map.
pub fn get_attribute<'a>(
    object: &'a serde_json::Map<String, Value>,
    path: &str,
) -> Option<&'a Value> {
    if let Some(direct) = object.get(path) {
        return Some(direct);
    }
    let (head, rest) = path.split_once('.')?;
    get_nested_value(object.get(head)?, rest)
}

/// Null, blank strings, empty arrays and empty objects count as empty.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        _ => false,
    }
}

/// Normalize a value for case-insensitive comparison: strings are trimmed and
/// lowercased, everything else is returned unchanged.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_lowercase()),
        other => other.clone(),
    }
}
