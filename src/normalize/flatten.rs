//! Two-pass reduction of the nested tree into a single-level row.
//!
//! Pass 1 collapses nodes that are exactly `{_value: x}` back to the bare
//! value `x` — leaves that never accumulated sibling structure. Pass 2
//! flattens the remainder into underscore-joined path keys, keying
//! quantile-shaped list entries by their quantile name instead of an index.

use crate::normalize::tree::VALUE_KEY;
use crate::normalize::FlatRow;

use serde_json::Value;

const QUANTILE_NAME_KEY: &str = "quantileName";

/// Pass 1: recursively replace any mapping that is exactly `{_value: x}`
/// with `x`, descending into mappings and lists otherwise.
///
/// Idempotent: running it on its own output is a no-op.
pub fn collapse_values(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 1 && map.contains_key(VALUE_KEY) {
                let inner = map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null);
                return collapse_values(inner);
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, collapse_values(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(collapse_values).collect()),
        other => other,
    }
}

/// Pass 2: flatten `value` into `out` under underscore-joined path keys.
///
/// List elements shaped like quantile records (mappings carrying
/// `quantileName`) emit `<parent>_<quantileName>_<field>` keys, dropping
/// the quantile name field itself; other list elements recurse with their
/// numeric index appended to the parent key.
pub fn flatten_into(out: &mut FlatRow, value: &Value, parent_key: &str) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let new_key = join_key(parent_key, key);
                flatten_into(out, child, &new_key);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                if let Some(entry) = item.as_object() {
                    if let Some(name) = entry.get(QUANTILE_NAME_KEY) {
                        let name = key_text(name);
                        for (key, field) in entry {
                            if key != QUANTILE_NAME_KEY {
                                out.insert(
                                    format!("{parent_key}_{name}_{key}"),
                                    field.clone(),
                                );
                            }
                        }
                        continue;
                    }
                }
                flatten_into(out, item, &format!("{parent_key}_{index}"));
            }
        }
        other => {
            out.insert(parent_key.to_string(), other.clone());
        }
    }
}

fn join_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}_{key}")
    }
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
