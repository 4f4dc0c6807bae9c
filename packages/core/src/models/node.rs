//! Tree Node Model
//!
//! A `TreeNode` is one row of a nested set forest: an identity, the interval
//! bounds that encode its position, the parent reference kept alongside the
//! bounds for cheap sibling checks, the depth, the optional scope value and
//! the caller-owned JSON payload.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One node of a nested set forest.
///
/// Bounds and depth are owned by the mutation engine. Writing them directly
/// breaks the interval invariants; use `NestedSetService` operations instead.
///
/// # Examples
///
/// ```rust
/// # use nestedset_core::models::TreeNode;
/// # use serde_json::json;
/// let node = TreeNode {
///     id: 1,
///     left: 1,
///     right: 6,
///     parent_id: None,
///     depth: 0,
///     scope: None,
///     payload: json!({"title": "root"}),
/// };
/// assert_eq!(node.children_count(), 2);
/// assert!(node.is_root());
/// assert!(node.contains(&TreeNode { id: 2, left: 2, right: 3, parent_id: Some(1), depth: 1, scope: None, payload: json!({}) }));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Store-assigned identity (positive once persisted)
    pub id: i64,

    /// Left interval bound
    pub left: i64,

    /// Right interval bound
    pub right: i64,

    /// Parent node ID (`None` for roots)
    pub parent_id: Option<i64>,

    /// Distance from the root (roots are 0)
    pub depth: i64,

    /// Forest partition value, when the schema has a scope column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Caller-owned data
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TreeNode {
    /// Whether the node has been assigned an identity by a store
    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.right == self.left + 1
    }

    /// Number of descendants, derived from the bounds alone
    pub fn children_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    /// Number of integer slots occupied by the node and its subtree
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Whether `other` lies strictly inside this node's interval
    pub fn contains(&self, other: &TreeNode) -> bool {
        other.left > self.left && other.right < self.right
    }

    /// Look up a top-level payload field
    pub fn payload_field(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.as_object().and_then(|map| map.get(key))
    }
}

/// Direction used when sorting children by a payload key
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

/// Total order over JSON values used for sort keys.
///
/// Values of different kinds order as null < bool < number < string < array
/// < object. Numbers compare numerically, strings lexicographically, and
/// arrays/objects by their serialized form.
pub fn compare_payload_values(a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    use serde_json::Value;

    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x.cmp(&y)
            } else {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}
