//! Canonical JSON serialization: stable key order, UTF-8, no BOM, so
//! hashes over a record are reproducible across re-serialization
//! (spec §4.6).

use serde_json::Value;
use std::collections::BTreeMap;

/// Re-serializes any `serde_json::Value` with map keys sorted, recursively.
/// `serde_json::Value`'s default map is already a `BTreeMap` when the
/// `preserve_order` feature is off, but this makes the guarantee explicit
/// and independent of that feature flag ever being enabled transitively.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serializes `value` to its canonical UTF-8 JSON string (no BOM; Rust
/// strings are never BOM-prefixed).
pub fn to_canonical_string(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).expect("canonicalized JSON values always serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_is_stable_regardless_of_insertion_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(to_canonical_string(&a), to_canonical_string(&b));
    }

    #[test]
    fn nested_objects_are_sorted_recursively() {
        let value = json!({"outer": {"z": 1, "a": 2}});
        assert_eq!(to_canonical_string(&value), r#"{"outer":{"a":2,"z":1}}"#);
    }
}
