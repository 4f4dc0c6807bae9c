//! Range predicates
//!
//! Pure functions deriving the store predicate for each structural query
//! from a node's bounds. None of them touch the store.

use crate::models::{Field, Predicate, TreeNode};

/// Nodes whose interval strictly contains `node`'s
pub fn ancestors(node: &TreeNode) -> Predicate {
    Predicate::lt(Field::Left, node.left).and(Predicate::gt(Field::Right, node.right))
}

/// Nodes strictly inside `node`, optionally at one depth only
pub fn children(node: &TreeNode, exact_depth: Option<i64>) -> Predicate {
    let inside = Predicate::gt(Field::Left, node.left).and(Predicate::lt(Field::Right, node.right));
    match exact_depth {
        Some(depth) => inside.and(Predicate::equals(Field::Depth, depth)),
        None => inside,
    }
}

pub fn direct_children(node: &TreeNode) -> Predicate {
    children(node, Some(node.depth + 1))
}

/// `node` and everything inside it
pub fn self_and_descendants(node: &TreeNode) -> Predicate {
    Predicate::ge(Field::Left, node.left).and(Predicate::le(Field::Right, node.right))
}

/// Same-depth nodes left of `node`, bounded by the parent's left bound
pub fn previous_siblings(node: &TreeNode, parent: Option<&TreeNode>) -> Predicate {
    let predicate =
        Predicate::equals(Field::Depth, node.depth).and(Predicate::lt(Field::Left, node.left));
    match parent {
        Some(parent) => predicate.and(Predicate::gt(Field::Left, parent.left)),
        None => predicate,
    }
}

/// Same-depth nodes right of `node`, bounded by the parent's right bound
pub fn next_siblings(node: &TreeNode, parent: Option<&TreeNode>) -> Predicate {
    let predicate =
        Predicate::equals(Field::Depth, node.depth).and(Predicate::gt(Field::Left, node.right));
    match parent {
        Some(parent) => predicate.and(Predicate::lt(Field::Left, parent.right)),
        None => predicate,
    }
}

/// The sibling ending immediately before `node` starts
pub fn previous_sibling(node: &TreeNode) -> Predicate {
    Predicate::equals(Field::Right, node.left - 1)
}

/// The sibling starting immediately after `node` ends
pub fn next_sibling(node: &TreeNode) -> Predicate {
    Predicate::equals(Field::Left, node.right + 1)
}

pub fn roots() -> Predicate {
    Predicate::equals(Field::Depth, 0)
}
