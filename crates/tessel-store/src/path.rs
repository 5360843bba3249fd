//! Dotted-path access
//!
//! Paths go through [`Value::get`] / [`Value::set`], so reactive containers
//! observe and notify exactly as they would for direct access, and component
//! contexts (hosts) route writes through their own rules.

use tracing::warn;

use crate::value::Value;

/// Split `a.b.c` into segments. Returns `None` for `a..b`, leading or
/// trailing dots.
pub fn split_path(path: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(segments)
}

/// Non-empty, well-formed dotted path
pub fn is_valid_path(path: &str) -> bool {
    !path.trim().is_empty() && split_path(path).is_some()
}

/// Resolve a dotted path. `""` and `"."` return `value` itself; missing
/// keys and non-container intermediates yield `Undefined`.
pub fn get_by_path(value: &Value, path: &str) -> Value {
    let path = path.trim();
    if path.is_empty() || path == "." {
        return value.clone();
    }
    let Some(segments) = split_path(path) else {
        return Value::Undefined;
    };

    let mut current = value.clone();
    for segment in segments {
        if !current.is_container() && current.as_str().is_none() {
            return Value::Undefined;
        }
        current = current.get(segment);
    }
    current
}

/// Assign through a dotted path, creating intermediate objects for missing
/// or non-container segments. Returns false (and logs) for empty or
/// malformed paths, or if the final write was rejected.
pub fn set_by_path(value: &Value, path: &str, new_value: Value) -> bool {
    let Some(segments) = split_path(path.trim()).filter(|_| !path.trim().is_empty()) else {
        warn!(path, "set_by_path: empty or malformed path");
        return false;
    };
    if !value.is_container() {
        warn!(path, "set_by_path: target is not an object");
        return false;
    }

    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return false,
    };

    let mut current = value.clone();
    for segment in parents {
        let mut next = current.get(segment);
        if !next.is_container() {
            if !current.set(segment, Value::object()) {
                return false;
            }
            next = current.get(segment);
        }
        current = next;
    }

    current.set(last, new_value)
}
