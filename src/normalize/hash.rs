//! Structural fingerprints for label mappings.
//!
//! Datapoints are grouped by the label combination they carry. The
//! fingerprint is a deterministic string built from the sorted key/value
//! pairs of the label mapping, so two mappings with the same pairs hash
//! identically regardless of insertion order.

use serde_json::Value;

/// Fingerprint assigned to datapoints that carry no labels at all.
///
/// Real fingerprints always contain a `:` separator, so this can never
/// collide with a labeled group.
pub const SENTINEL_FINGERPRINT: &str = "unlabeled";

/// Compute the structural fingerprint of a label value.
///
/// Mappings hash to the concatenation of `key:` + fingerprint-of-value over
/// lexicographically sorted keys, recursing into nested mappings. Any other
/// value hashes to its string form.
pub fn fingerprint(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = String::new();
            for key in keys {
                out.push_str(key);
                out.push(':');
                out.push_str(&fingerprint(&map[key]));
            }
            out
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
