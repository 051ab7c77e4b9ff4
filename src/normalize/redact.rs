//! Redaction and merging of run metadata into the output row.
//!
//! Timestamp-, uuid-, and version-like attributes vary per run without
//! carrying signal, so they are dropped before the remaining metadata is
//! copied into the row. Nested job-configuration attributes are re-emitted
//! under `jobConfig.`-prefixed keys.

use crate::normalize::FlatRow;

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const JOB_CONFIG_KEY: &str = "jobConfig";

// Start-anchored, case-insensitive
const DROP_KEY_PATTERNS: [&str; 3] = [r"(?i).*time.*", r"(?i)^uuid", r"(?i)^version"];

fn drop_regexes() -> &'static Vec<Regex> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        DROP_KEY_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("drop pattern is a valid literal"))
            .collect()
    })
}

/// Whether a metadata key is dropped by redaction.
pub fn is_redacted_key(key: &str) -> bool {
    drop_regexes().iter().any(|r| r.is_match(key))
}

/// Copy of `metadata` with redacted keys removed.
pub fn redact(metadata: &Map<String, Value>) -> Map<String, Value> {
    metadata
        .iter()
        .filter(|(key, _)| !is_redacted_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Redact `metadata` and merge the survivors into `row`: plain keys copied
/// as-is, `jobConfig` children re-prefixed as `jobConfig.<field>`.
pub fn merge_redacted(row: &mut FlatRow, metadata: &Map<String, Value>) {
    for (key, value) in redact(metadata) {
        if key != JOB_CONFIG_KEY {
            row.insert(key, value);
        } else if let Value::Object(job_config) = value {
            for (field, field_value) in job_config {
                row.insert(format!("{JOB_CONFIG_KEY}.{field}"), field_value);
            }
        } else {
            row.insert(key, value);
        }
    }
}
