//! ABOUTME: Deterministic input hashing for checkpoint drift detection
//! ABOUTME: sha2 is the hashing dependency used consistently across the workspace

use sha2::{Digest, Sha256};

/// Hashes `inputs` for checkpoint comparison. Sorting-invariant over input
/// keys (`serde_json::to_value` + `BTreeMap` round-trip canonicalizes key
/// order) and type-stable (a `serde_json::Value`'s variant is part of its
/// serialized form).
#[must_use]
pub fn compute_inputs_hash(inputs: &serde_json::Value) -> String {
    let canonical = canonicalize(inputs);
    let bytes = serde_json::to_vec(&canonical).expect("Value always serializes");
    let digest = Sha256::digest(&bytes);
    let hex = format!("{digest:x}");
    hex[..16].to_string()
}

/// Recursively re-sorts object keys so that `{"a":1,"b":2}` and
/// `{"b":2,"a":1}` serialize identically.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, serde_json::Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            serde_json::to_value(sorted).expect("BTreeMap<String, Value> always serializes")
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_stable_across_key_order() {
        let a = json!({"name": "Alice", "count": 3});
        let b = json!({"count": 3, "name": "Alice"});
        assert_eq!(compute_inputs_hash(&a), compute_inputs_hash(&b));
    }

    #[test]
    fn hash_changes_with_value() {
        let a = json!({"name": "Alice"});
        let b = json!({"name": "Bob"});
        assert_ne!(compute_inputs_hash(&a), compute_inputs_hash(&b));
    }

    #[test]
    fn hash_is_sixteen_hex_chars() {
        let hash = compute_inputs_hash(&json!({"x": 1}));
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn nested_object_key_order_does_not_matter() {
        let a = json!({"outer": {"a": 1, "b": 2}});
        let b = json!({"outer": {"b": 2, "a": 1}});
        assert_eq!(compute_inputs_hash(&a), compute_inputs_hash(&b));
    }

    proptest::proptest! {
        /// Hashing an object is stable under any permutation of its
        /// top-level keys.
        #[test]
        fn hash_is_permutation_invariant(
            name in "[a-zA-Z]{1,8}",
            count in 0i64..1000,
            active in proptest::bool::ANY,
        ) {
            let forward = json!({"name": name.clone(), "count": count, "active": active});
            let reversed = json!({"active": active, "count": count, "name": name});
            proptest::prop_assert_eq!(compute_inputs_hash(&forward), compute_inputs_hash(&reversed));
        }
    }
}
