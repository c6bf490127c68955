//! # Canonical JSON
//!
//! One serialization per value: object keys sorted lexicographically,
//! compact separators, no whitespace. Arrays keep their order. This is the
//! only form ever fed to a MAC or a fingerprint.

use serde::Serialize;
use serde_json::Value;

use crate::CryptoError;

/// Canonicalize any serializable value into its canonical JSON string.
///
/// # Errors
///
/// Returns `CryptoError::Canonicalize` if the value cannot be represented
/// as JSON (e.g. a map with non-string keys or a NaN float).
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, CryptoError> {
    let value = serde_json::to_value(value).map_err(|e| CryptoError::Canonicalize(e.to_string()))?;
    let mut out = String::new();
    write_canonical(&value, &mut out);
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Object keys are plain strings; serde_json escaping applies.
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars already have a single compact representation.
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_recursively() {
        let value = json!({"z": 1, "a": {"m": true, "b": [3, 1]}});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"a":{"b":[3,1],"m":true},"z":1}"#
        );
    }

    #[test]
    fn test_no_whitespace() {
        let value = json!({"k": [1, 2, 3], "s": "a b"});
        let canon = canonical_json(&value).unwrap();
        assert!(!canon.contains(' ') || canon.contains("a b"));
        assert_eq!(canon, r#"{"k":[1,2,3],"s":"a b"}"#);
    }

    #[test]
    fn test_array_order_preserved() {
        let value = json!(["c", "a", "b"]);
        assert_eq!(canonical_json(&value).unwrap(), r#"["c","a","b"]"#);
    }

    #[test]
    fn test_empty_object_and_array() {
        assert_eq!(canonical_json(&json!({})).unwrap(), "{}");
        assert_eq!(canonical_json(&json!([])).unwrap(), "[]");
    }

    #[test]
    fn test_string_escaping() {
        let value = json!({"quote": "he said \"hi\""});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"quote":"he said \"hi\""}"#
        );
    }

    fn arb_json(depth: u32) -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z0-9 ]{0,12}".prop_map(Value::from),
        ];
        leaf.prop_recursive(depth, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::from),
                prop::collection::hash_map("[a-z_]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        /// Canonicalization is a fixpoint: parsing the canonical string and
        /// canonicalizing again yields the same bytes.
        #[test]
        fn prop_canonical_is_fixpoint(value in arb_json(3)) {
            let once = canonical_json(&value).unwrap();
            let reparsed: Value = serde_json::from_str(&once).unwrap();
            let twice = canonical_json(&reparsed).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
