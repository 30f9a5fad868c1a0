//! Structural subset comparison over JSON-like values (§4.1).
//!
//! `is_subset` determines whether `sub` is structurally contained in `full`:
//! objects compare key-wise (extra keys in `full` are allowed), arrays compare
//! element-wise without regard to order, and scalars compare by equality.

use serde_json::Value;

/// Returns `true` iff `sub` is structurally contained in `full`.
pub fn is_subset(sub: &Value, full: &Value) -> bool {
    match (sub, full) {
        (Value::Object(sub_map), Value::Object(full_map)) => sub_map
            .iter()
            .all(|(k, v)| full_map.get(k).is_some_and(|fv| is_subset(v, fv))),
        (Value::Array(sub_items), Value::Array(full_items)) => sub_items
            .iter()
            .all(|item| full_items.iter().any(|candidate| is_subset(item, candidate))),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

/// ASCII case-insensitive string equality, used for host/path/header-name
/// comparisons throughout the matcher.
pub fn string_compare(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
