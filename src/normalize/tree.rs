//! Label-precedence nesting of grouped aggregates.
//!
//! Grouped metrics are re-nested into a drill-down tree: each label key
//! present on an aggregate adds two levels, a `byLabel<Key>` group marker
//! and the label's value. Colliding label combinations reduce to one
//! pairwise-averaged scalar at the leaf instead of growing unboundedly.

use crate::normalize::group::{AggregateValue, GroupedRun};

use serde_json::{Map, Number, Value};

/// Label nesting precedence. Deliberately distinct from the projection
/// order in grouping: `component` nests above `resource` and `container`.
pub const NEST_PRECEDENCE: [&str; 7] = [
    "mode",
    "verb",
    "namespace",
    "component",
    "resource",
    "container",
    "endpoint",
];

/// Reserved leaf key holding a node's own value once it has children.
pub const VALUE_KEY: &str = "_value";

/// One node of the nested tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(f64),
    /// Residual entries carried over from a list-valued aggregate.
    List(Vec<Value>),
    Branch(Branch),
}

/// Insertion-ordered mapping of child keys to nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    entries: Vec<(String, Node)>,
}

impl Branch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, node)| node)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, node)| node)
    }

    pub fn insert(&mut self, key: &str, node: Node) {
        match self.get_mut(key) {
            Some(slot) => *slot = node,
            None => self.entries.push((key.to_string(), node)),
        }
    }

    /// Child node under `key`, inserting an empty branch when absent.
    fn entry_node(&mut self, key: &str) -> &mut Node {
        let index = match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => index,
            None => {
                self.entries.push((key.to_string(), Node::Branch(Branch::new())));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    /// Merge a value into this branch's `_value` leaf: scalars average
    /// pairwise with the occupant, lists extend an existing list, and a
    /// mixed collision stores the newer value.
    fn merge_leaf(&mut self, value: AggregateValue) {
        match (self.get_mut(VALUE_KEY), value) {
            (None, value) => self.insert(VALUE_KEY, value.into_node()),
            (Some(Node::Scalar(old)), AggregateValue::Scalar(new)) => *old = (*old + new) / 2.0,
            (Some(Node::List(old)), AggregateValue::Entries(new)) => old.extend(new),
            (Some(slot), value) => *slot = value.into_node(),
        }
    }
}

impl AggregateValue {
    fn into_node(self) -> Node {
        match self {
            AggregateValue::Scalar(v) => Node::Scalar(v),
            AggregateValue::Entries(list) => Node::List(list),
        }
    }
}

impl Node {
    /// View this node as a branch, converting a scalar or list occupant in
    /// place to `{_value: <occupant>}` so the old value is preserved.
    fn ensure_branch(&mut self) -> &mut Branch {
        if !matches!(self, Node::Branch(_)) {
            let occupant = std::mem::replace(self, Node::Branch(Branch::new()));
            if let Node::Branch(branch) = self {
                branch.insert(VALUE_KEY, occupant);
            }
        }
        match self {
            Node::Branch(branch) => branch,
            _ => unreachable!("just converted to a branch"),
        }
    }

    /// Convert the tree into a plain JSON value, preserving child order.
    pub fn into_value(self) -> Value {
        match self {
            Node::Scalar(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
            Node::List(entries) => Value::Array(entries),
            Node::Branch(branch) => {
                let mut map = Map::new();
                for (key, node) in branch.entries {
                    map.insert(key, node.into_value());
                }
                Value::Object(map)
            }
        }
    }
}

/// Re-nest all grouped metrics into one tree rooted at metric names.
///
/// Aggregates without labels merge directly into the metric node's `_value`
/// leaf. Labeled aggregates descend two levels per present label key, in
/// `NEST_PRECEDENCE` order, and merge at the final leaf.
pub fn build_hierarchy(grouped: &GroupedRun) -> Node {
    let mut root = Branch::new();

    for (metric, aggregates) in grouped.iter() {
        let metric_node = root.entry_node(metric);

        for aggregate in aggregates {
            let labels = aggregate.labels.as_ref();
            let label_keys: Vec<&str> = NEST_PRECEDENCE
                .iter()
                .copied()
                .filter(|key| labels.is_some_and(|l| l.contains_key(*key)))
                .collect();

            if label_keys.is_empty() {
                metric_node.ensure_branch().merge_leaf(aggregate.value.clone());
                continue;
            }

            let mut curr: &mut Node = &mut *metric_node;
            for key in label_keys {
                let key_value = labels
                    .and_then(|l| l.get(key))
                    .map(value_as_key)
                    .unwrap_or_default();
                let group_key = group_marker(key);
                let branch = curr.ensure_branch();
                curr = branch.entry_node(&group_key).ensure_branch().entry_node(&key_value);
            }
            curr.ensure_branch().merge_leaf(aggregate.value.clone());
        }
    }

    Node::Branch(root)
}

/// `mode` → `byLabelMode`
fn group_marker(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!(
            "byLabel{}{}",
            first.to_uppercase(),
            chars.as_str().to_lowercase()
        ),
        None => "byLabel".to_string(),
    }
}

fn value_as_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
