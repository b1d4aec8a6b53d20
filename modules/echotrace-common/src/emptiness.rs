//! Recursive emptiness check over JSON payloads.
//!
//! Classification between `empty` and `failed` and the retry pre-check both
//! hinge on whether a stored payload actually contains anything: the remote
//! API sometimes returns structurally-present-but-hollow documents (an
//! object whose every field is null, "", or []). Those count as empty.

use serde_json::Value;

/// True if the value carries no usable content.
///
/// Null, empty strings, whitespace-only strings, empty arrays and objects
/// are empty; arrays and objects are empty when every member is. Numbers
/// and booleans are never empty: `0` and `false` are real values.
pub fn is_effectively_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(_) | Value::Number(_) => false,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_effectively_empty),
        Value::Object(map) => map.values().all(is_effectively_empty),
    }
}

/// Whether a stored payload contains any usable replies.
///
/// Payloads written by this system carry a `replies` field and are judged by
/// it alone (the envelope always has non-empty identity fields). Anything
/// else, such as legacy documents or raw provider responses, is judged
/// whole.
pub fn payload_is_empty(value: &Value) -> bool {
    match value.get("replies") {
        Some(replies) => is_effectively_empty(replies),
        None => is_effectively_empty(value),
    }
}
