//! Predicate Model
//!
//! Typed predicates, assignments and orderings over the logical nested set
//! fields. The engine builds these values; store adapters either render them
//! to SQL against a [`SchemaDescriptor`](crate::models::SchemaDescriptor) or
//! evaluate them directly against in-memory rows.

use crate::models::TreeNode;
use std::cmp::Ordering;

/// Logical integer fields of a nested set row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Left,
    Right,
    Parent,
    Depth,
}

impl Field {
    /// Read the field from a node (`None` only for a root's parent)
    pub fn value_of(self, node: &TreeNode) -> Option<i64> {
        match self {
            Field::Id => Some(node.id),
            Field::Left => Some(node.left),
            Field::Right => Some(node.right),
            Field::Parent => node.parent_id,
            Field::Depth => Some(node.depth),
        }
    }
}

/// Comparison operator for single-field predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn as_sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }

    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparison::Eq => lhs == rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
        }
    }
}

/// Row filter
///
/// # Examples
///
/// ```rust
/// # use nestedset_core::models::{Field, Predicate};
/// // Strict descendants of a node spanning (1, 10)
/// let inside = Predicate::gt(Field::Left, 1).and(Predicate::lt(Field::Right, 10));
/// assert!(matches!(inside, Predicate::And(ref parts) if parts.len() == 2));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row
    All,
    /// `field <op> value`
    Compare(Field, Comparison, i64),
    /// Scope column equals the value (`None` means the column is NULL)
    Scope(Option<String>),
    /// Conjunction of all parts
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn equals(field: Field, value: i64) -> Self {
        Self::Compare(field, Comparison::Eq, value)
    }

    pub fn lt(field: Field, value: i64) -> Self {
        Self::Compare(field, Comparison::Lt, value)
    }

    pub fn le(field: Field, value: i64) -> Self {
        Self::Compare(field, Comparison::Le, value)
    }

    pub fn gt(field: Field, value: i64) -> Self {
        Self::Compare(field, Comparison::Gt, value)
    }

    pub fn ge(field: Field, value: i64) -> Self {
        Self::Compare(field, Comparison::Ge, value)
    }

    /// Inclusive range `low <= field <= high`
    pub fn between(field: Field, low: i64, high: i64) -> Self {
        Self::ge(field, low).and(Self::le(field, high))
    }

    pub fn id(id: i64) -> Self {
        Self::equals(Field::Id, id)
    }

    /// Conjoin, flattening nested conjunctions and dropping `All`
    pub fn and(self, other: Predicate) -> Self {
        let mut parts = Vec::new();
        for predicate in [self, other] {
            match predicate {
                Predicate::All => {}
                Predicate::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Predicate::All,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    /// Evaluate against an in-memory row
    pub fn matches(&self, node: &TreeNode) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Compare(field, op, value) => field
                .value_of(node)
                .map(|actual| op.holds(actual, *value))
                .unwrap_or(false),
            Predicate::Scope(scope) => &node.scope == scope,
            Predicate::And(parts) => parts.iter().all(|part| part.matches(node)),
        }
    }
}

/// Column update applied by `update_all`
///
/// All assignments of one update read the row as it was before the update,
/// matching SQL `UPDATE ... SET a = a + 1, b = b + 1` semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `field = field + delta`
    Shift(Field, i64),
    /// `field = value` (`None` writes NULL)
    Set(Field, Option<i64>),
}

impl Assignment {
    /// Shift both interval bounds by the same delta
    pub fn shift_bounds(delta: i64) -> Vec<Assignment> {
        vec![
            Assignment::Shift(Field::Left, delta),
            Assignment::Shift(Field::Right, delta),
        ]
    }

    /// Apply a batch of assignments to one row
    pub fn apply_all(assignments: &[Assignment], node: &mut TreeNode) {
        let before = node.clone();
        for assignment in assignments {
            match assignment {
                Assignment::Shift(field, delta) => {
                    let current = field.value_of(&before).unwrap_or(0);
                    write_field(node, *field, Some(current + delta));
                }
                Assignment::Set(field, value) => write_field(node, *field, *value),
            }
        }
    }
}

fn write_field(node: &mut TreeNode, field: Field, value: Option<i64>) {
    match field {
        Field::Id => node.id = value.unwrap_or(node.id),
        Field::Left => node.left = value.unwrap_or(node.left),
        Field::Right => node.right = value.unwrap_or(node.right),
        Field::Parent => node.parent_id = value,
        Field::Depth => node.depth = value.unwrap_or(node.depth),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Result ordering for store reads.
///
/// `OrderBy::default()` is ascending left bound, i.e. document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: Field,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: Field) -> Self {
        Self {
            field,
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: Field) -> Self {
        Self {
            field,
            direction: Direction::Desc,
        }
    }

    /// Compare two rows; NULLs sort first ascending, ties break on id
    pub fn compare(&self, a: &TreeNode, b: &TreeNode) -> Ordering {
        let ordering = self
            .field
            .value_of(a)
            .cmp(&self.field.value_of(b))
            .then_with(|| a.id.cmp(&b.id));
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

impl Default for OrderBy {
    fn default() -> Self {
        Self::asc(Field::Left)
    }
}
