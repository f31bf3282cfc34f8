//! Declarative metadata filters and their evaluator.

use crate::id::EngramId;
use crate::types::{Chunk, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Comparison applied to one metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
}

/// Boolean connective for a filter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

/// Leaf predicate: `field op value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FilterCondition {
    /// Evaluate against a chunk's metadata.
    ///
    /// An absent field fails the predicate, negative operators included;
    /// an operand type the operator cannot compare also evaluates to false
    /// rather than erroring.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        let Some(actual) = metadata.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Ne => actual != &self.value,
            FilterOp::Gt => compare_numbers(actual, &self.value, |a, b| a > b),
            FilterOp::Gte => compare_numbers(actual, &self.value, |a, b| a >= b),
            FilterOp::Lt => compare_numbers(actual, &self.value, |a, b| a < b),
            FilterOp::Lte => compare_numbers(actual, &self.value, |a, b| a <= b),
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|values| values.contains(actual)),
            FilterOp::NotIn => self
                .value
                .as_array()
                .is_some_and(|values| !values.contains(actual)),
            FilterOp::Contains => containment(actual, &self.value).unwrap_or(false),
            FilterOp::NotContains => containment(actual, &self.value)
                .map(|contained| !contained)
                .unwrap_or(false),
            FilterOp::StartsWith => {
                string_pair(actual, &self.value).is_some_and(|(a, b)| a.starts_with(b))
            }
            FilterOp::EndsWith => {
                string_pair(actual, &self.value).is_some_and(|(a, b)| a.ends_with(b))
            }
        }
    }
}

/// Ordering comparisons apply to JSON numbers only; anything else is a
/// type mismatch.
fn compare_numbers(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Substring test for strings, membership test for arrays; `None` marks a
/// type mismatch.
fn containment(actual: &Value, expected: &Value) -> Option<bool> {
    match (actual, expected) {
        (Value::String(a), Value::String(needle)) => Some(a.contains(needle.as_str())),
        (Value::Array(items), needle) => Some(items.contains(needle)),
        _ => None,
    }
}

fn string_pair<'a>(actual: &'a Value, expected: &'a Value) -> Option<(&'a str, &'a str)> {
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => Some((a.as_str(), b.as_str())),
        _ => None,
    }
}

/// Node of the predicate tree: a nested group or a leaf condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    Group(FilterGroup),
    Condition(FilterCondition),
}

impl FilterNode {
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Group(group) => group.matches(metadata),
            Self::Condition(condition) => condition.matches(metadata),
        }
    }
}

/// Boolean combination of filter nodes.
///
/// An empty `and` group is vacuously true; an empty `or` group is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub operator: LogicalOp,
    pub filters: Vec<FilterNode>,
}

impl FilterGroup {
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self.operator {
            LogicalOp::And => self.filters.iter().all(|node| node.matches(metadata)),
            LogicalOp::Or => self.filters.iter().any(|node| node.matches(metadata)),
        }
    }
}

/// Complete filter applied by the query pipeline: an optional metadata
/// predicate tree conjoined with temporal and document-id constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FilterGroup>,

    /// Inclusive lower bound on chunk creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,

    /// Inclusive upper bound on chunk creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<HashSet<EngramId>>,
}

impl SearchFilter {
    /// True when no constraint is present at all.
    pub fn is_empty(&self) -> bool {
        self.metadata.is_none()
            && self.created_after.is_none()
            && self.created_before.is_none()
            && self.document_ids.is_none()
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(after) = self.created_after {
            if chunk.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if chunk.created_at > before {
                return false;
            }
        }
        if let Some(ids) = &self.document_ids {
            if !ids.contains(&chunk.document_id) {
                return false;
            }
        }
        if let Some(group) = &self.metadata {
            if !group.matches(&chunk.metadata) {
                return false;
            }
        }
        true
    }
}
