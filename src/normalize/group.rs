//! Per-metric grouping of raw datapoints by label fingerprint.
//!
//! Each metric's documents collapse into one aggregate per distinct label
//! combination. Scalar-valued documents feed a `acc + value/2` recurrence;
//! documents without a scalar value (quantile records) accumulate as a list
//! of residual entries instead. The recurrence is what the existing reports
//! are built on, so it is kept as-is even though it is not a true mean.

use crate::normalize::filter::PatternFilter;
use crate::normalize::hash::{fingerprint, SENTINEL_FINGERPRINT};

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// Label keys recognized when projecting a datapoint's labels into the
/// grouped aggregate. Only these survive into the nesting stage.
pub const LABEL_PROJECTION_ORDER: [&str; 7] = [
    "mode",
    "verb",
    "namespace",
    "resource",
    "container",
    "component",
    "endpoint",
];

/// Fields stripped from valueless documents before list accumulation.
/// `quantileName` is intentionally absent: the flattener keys on it.
const DROP_LIST: [&str; 8] = [
    "metadata",
    "uuid",
    "metricName",
    "labels",
    "query",
    "value",
    "jobName",
    "timestamp",
];

const GC_JOB_NAME: &str = "garbage-collection";

/// The value side of a grouped aggregate.
///
/// The transition is one-directional: an aggregate starts as `Scalar(0.0)`
/// and becomes `Entries` on the first valueless document, discarding the
/// scalar. It never goes back.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateValue {
    /// Recency-weighted accumulator over scalar-valued documents.
    Scalar(f64),
    /// Residual entries of valueless documents, in arrival order.
    Entries(Vec<Value>),
}

/// One aggregate per (metric, label fingerprint).
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedAggregate {
    pub value: AggregateValue,
    /// Projection of the recognized label keys, when the datapoint had labels.
    pub labels: Option<Map<String, Value>>,
}

/// Accumulated grouping output for one run, keyed by metric name in
/// insertion order. Threaded explicitly through grouping calls; repeated
/// calls for the same metric name append rather than overwrite.
#[derive(Debug, Default)]
pub struct GroupedRun {
    metrics: Vec<(String, Vec<GroupedAggregate>)>,
}

impl GroupedRun {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Metrics and their aggregates, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[GroupedAggregate])> {
        self.metrics
            .iter()
            .map(|(name, aggs)| (name.as_str(), aggs.as_slice()))
    }

    pub fn get(&self, metric: &str) -> Option<&[GroupedAggregate]> {
        self.metrics
            .iter()
            .find(|(name, _)| name == metric)
            .map(|(_, aggs)| aggs.as_slice())
    }

    fn extend(&mut self, metric: &str, aggregates: Vec<GroupedAggregate>) {
        match self.metrics.iter_mut().find(|(name, _)| name == metric) {
            Some((_, existing)) => existing.extend(aggregates),
            None => self.metrics.push((metric.to_string(), aggregates)),
        }
    }
}

/// Group one metric's raw documents into `output`.
///
/// Produces nothing when the document list is empty, the first document
/// lacks `metricName`, or the name matches an exclusion pattern. Documents
/// from churn phases or garbage-collection jobs are skipped as noise.
pub fn group_metric(
    metric: &str,
    entries: &[Value],
    filter: &PatternFilter,
    output: &mut GroupedRun,
) {
    let Some(first) = entries.first() else {
        return;
    };
    let Some(metric_name) = first.get("metricName").and_then(Value::as_str) else {
        warn!(metric = %metric, "'metricName' missing in first entry of metric, skipping");
        return;
    };
    let metric_name = metric_name.to_string();

    if filter.is_excluded(&metric_name) {
        return;
    }

    let mut grouped: Vec<GroupedAggregate> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let Some(doc) = entry.as_object() else {
            continue;
        };
        // Churn-phase and garbage-collection datapoints are noise
        if doc.contains_key("churnMetric") {
            continue;
        }
        if doc
            .get("jobName")
            .and_then(Value::as_str)
            .is_some_and(|name| name.eq_ignore_ascii_case(GC_JOB_NAME))
        {
            continue;
        }

        let labels = doc.get("labels").filter(|v| is_truthy(v));
        let label_hash = match labels {
            Some(value) => fingerprint(value),
            None => SENTINEL_FINGERPRINT.to_string(),
        };

        let index = *slots.entry(label_hash).or_insert_with(|| {
            grouped.push(GroupedAggregate {
                value: AggregateValue::Scalar(0.0),
                labels: labels.and_then(Value::as_object).map(project_labels),
            });
            grouped.len() - 1
        });
        let aggregate = &mut grouped[index];

        if let Some(value) = doc.get("value").and_then(Value::as_f64) {
            match &mut aggregate.value {
                AggregateValue::Scalar(acc) => *acc += value / 2.0,
                // Once list-valued, the aggregate stays list-valued
                AggregateValue::Entries(list) => list.push(Value::Object(strip_dropped(doc))),
            }
        } else {
            let cleaned = Value::Object(strip_dropped(doc));
            match &mut aggregate.value {
                // First valueless entry discards the scalar accumulator
                AggregateValue::Scalar(_) => {
                    aggregate.value = AggregateValue::Entries(vec![cleaned]);
                }
                AggregateValue::Entries(list) => list.push(cleaned),
            }
        }
    }

    output.extend(&metric_name, grouped);
}

fn project_labels(labels: &Map<String, Value>) -> Map<String, Value> {
    let mut projected = Map::new();
    for key in LABEL_PROJECTION_ORDER {
        if let Some(value) = labels.get(key) {
            projected.insert(key.to_string(), value.clone());
        }
    }
    projected
}

fn strip_dropped(doc: &Map<String, Value>) -> Map<String, Value> {
    doc.iter()
        .filter(|(key, _)| !DROP_LIST.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_filter() -> PatternFilter {
        PatternFilter::compile("").unwrap()
    }

    fn scalar_of(run: &GroupedRun, metric: &str, index: usize) -> f64 {
        match &run.get(metric).unwrap()[index].value {
            AggregateValue::Scalar(v) => *v,
            other => panic!("expected scalar aggregate, got {other:?}"),
        }
    }

    #[test]
    fn test_scalar_recurrence_adds_half_of_each_value() {
        let entries = vec![
            json!({"metricName": "x", "value": 10, "labels": {"mode": "a"}}),
            json!({"metricName": "x", "value": 20, "labels": {"mode": "a"}}),
        ];
        let mut run = GroupedRun::default();
        group_metric("x", &entries, &no_filter(), &mut run);

        // 0 + 10/2 + 20/2, not a true mean
        assert_eq!(scalar_of(&run, "x", 0), 15.0);
    }

    #[test]
    fn test_label_order_does_not_split_groups() {
        let entries = vec![
            json!({"metricName": "x", "value": 4, "labels": {"mode": "a", "verb": "GET"}}),
            json!({"metricName": "x", "value": 6, "labels": {"verb": "GET", "mode": "a"}}),
        ];
        let mut run = GroupedRun::default();
        group_metric("x", &entries, &no_filter(), &mut run);

        assert_eq!(run.get("x").unwrap().len(), 1, "same labels, one group");
        assert_eq!(scalar_of(&run, "x", 0), 5.0);
    }

    #[test]
    fn test_distinct_labels_get_distinct_groups() {
        let entries = vec![
            json!({"metricName": "x", "value": 4, "labels": {"verb": "GET"}}),
            json!({"metricName": "x", "value": 6, "labels": {"verb": "POST"}}),
            json!({"metricName": "x", "value": 8}),
        ];
        let mut run = GroupedRun::default();
        group_metric("x", &entries, &no_filter(), &mut run);

        let aggs = run.get("x").unwrap();
        assert_eq!(aggs.len(), 3, "two labeled groups plus the unlabeled one");
        assert_eq!(scalar_of(&run, "x", 2), 4.0);
        assert!(aggs[2].labels.is_none());
    }

    #[test]
    fn test_valueless_entry_becomes_list_and_keeps_quantile_name() {
        let entries = vec![json!({
            "metricName": "latency",
            "quantileName": "p99",
            "uuid": "abc",
            "timestamp": "2024-01-01",
            "other": 5
        })];
        let mut run = GroupedRun::default();
        group_metric("latency", &entries, &no_filter(), &mut run);

        let aggs = run.get("latency").unwrap();
        match &aggs[0].value {
            AggregateValue::Entries(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0], json!({"quantileName": "p99", "other": 5}));
            }
            other => panic!("expected list aggregate, got {other:?}"),
        }
    }

    #[test]
    fn test_first_valueless_entry_discards_scalar_accumulator() {
        let entries = vec![
            json!({"metricName": "x", "value": 10}),
            json!({"metricName": "x", "quantileName": "p50", "avg": 1}),
            json!({"metricName": "x", "quantileName": "p99", "avg": 2}),
        ];
        let mut run = GroupedRun::default();
        group_metric("x", &entries, &no_filter(), &mut run);

        match &run.get("x").unwrap()[0].value {
            AggregateValue::Entries(list) => assert_eq!(list.len(), 2),
            other => panic!("scalar should have been discarded, got {other:?}"),
        }
    }

    #[test]
    fn test_churn_and_garbage_collection_entries_are_skipped() {
        let entries = vec![
            json!({"metricName": "x", "value": 100, "churnMetric": true}),
            json!({"metricName": "x", "value": 100, "jobName": "Garbage-Collection"}),
            json!({"metricName": "x", "value": 10}),
        ];
        let mut run = GroupedRun::default();
        group_metric("x", &entries, &no_filter(), &mut run);

        assert_eq!(scalar_of(&run, "x", 0), 5.0);
    }

    #[test]
    fn test_missing_metric_name_skips_metric() {
        let entries = vec![json!({"value": 10})];
        let mut run = GroupedRun::default();
        group_metric("x", &entries, &no_filter(), &mut run);
        assert!(run.is_empty());
    }

    #[test]
    fn test_empty_entries_produce_nothing() {
        let mut run = GroupedRun::default();
        group_metric("x", &[], &no_filter(), &mut run);
        assert!(run.is_empty());
    }

    #[test]
    fn test_excluded_metric_produces_nothing() {
        let filter = PatternFilter::compile("^etcd").unwrap();
        let entries = vec![json!({"metricName": "etcdDiskSync", "value": 10})];
        let mut run = GroupedRun::default();
        group_metric("etcdDiskSync", &entries, &filter, &mut run);
        assert!(run.is_empty());
    }

    #[test]
    fn test_repeated_calls_append_not_overwrite() {
        let entries_a = vec![json!({"metricName": "x", "value": 10, "labels": {"mode": "a"}})];
        let entries_b = vec![json!({"metricName": "x", "value": 20, "labels": {"mode": "b"}})];
        let mut run = GroupedRun::default();
        group_metric("x", &entries_a, &no_filter(), &mut run);
        group_metric("x", &entries_b, &no_filter(), &mut run);

        assert_eq!(run.iter().count(), 1, "still a single metric name");
        assert_eq!(run.get("x").unwrap().len(), 2);
    }

    #[test]
    fn test_labels_projected_to_recognized_keys_only() {
        let entries = vec![json!({
            "metricName": "x",
            "value": 1,
            "labels": {"verb": "GET", "pod": "kube-system-xyz", "mode": "server"}
        })];
        let mut run = GroupedRun::default();
        group_metric("x", &entries, &no_filter(), &mut run);

        let labels = run.get("x").unwrap()[0].labels.as_ref().unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains_key("verb"));
        assert!(labels.contains_key("mode"));
        assert!(!labels.contains_key("pod"));
    }
}
