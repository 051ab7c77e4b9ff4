//! Per-run normalization: many raw metric documents in, one flat row out.
//!
//! The driver is a pure function of one run's payload. It groups each
//! metric's documents by label fingerprint, re-nests the grouped aggregates
//! by label precedence, flattens the tree into underscore-joined columns,
//! merges the redacted run metadata, and attaches a cluster health score.

pub mod filter;
pub mod flatten;
pub mod group;
pub mod hash;
pub mod health;
pub mod redact;
pub mod tree;

pub use filter::PatternFilter;
pub use group::{group_metric, AggregateValue, GroupedAggregate, GroupedRun};
pub use hash::{fingerprint, SENTINEL_FINGERPRINT};
pub use health::HealthScore;
pub use tree::{build_hierarchy, Node};

use crate::Result;

use serde::Deserialize;
use serde_json::{Map, Value};

/// The final per-run output: column name to value.
pub type FlatRow = Map<String, Value>;

/// One run's raw payload as produced by the query stage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunPayload {
    /// Attributes describing the run (benchmark name, pass flag, nested
    /// `jobConfig`, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Raw documents grouped by metric name, in retrieval order.
    #[serde(default)]
    pub metrics: Map<String, Value>,
}

/// Metric name under which alert documents are stored, when present.
const ALERT_METRIC: &str = "alert";

/// Output column carrying the health classification.
const HEALTH_COLUMN: &str = "cluster_health_score";

/// Normalize one run into a single flat row.
///
/// `exclude_patterns` is a comma-separated list of regexes; a metric whose
/// name matches any of them is left out of the row. An invalid pattern is a
/// fatal configuration error.
pub fn normalize(payload: &RunPayload, exclude_patterns: &str) -> Result<FlatRow> {
    let filter = PatternFilter::compile(exclude_patterns)?;

    let mut grouped = GroupedRun::default();
    for (metric, documents) in &payload.metrics {
        let entries = documents.as_array().map(Vec::as_slice).unwrap_or(&[]);
        group_metric(metric, entries, &filter, &mut grouped);
    }

    let nested = build_hierarchy(&grouped);
    let collapsed = flatten::collapse_values(nested.into_value());

    let mut row = FlatRow::new();
    flatten::flatten_into(&mut row, &collapsed, "");

    redact::merge_redacted(&mut row, &payload.metadata);

    let alerts = payload
        .metrics
        .get(ALERT_METRIC)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    // A run that cannot prove it passed is treated as failed
    let passed = payload
        .metadata
        .get("passed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    row.insert(
        HEALTH_COLUMN.to_string(),
        Value::String(health::score(alerts, passed).as_str().to_string()),
    );

    Ok(row)
}
