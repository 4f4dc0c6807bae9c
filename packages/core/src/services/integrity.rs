//! Integrity Checker
//!
//! Verifies the nested set invariants over a snapshot of rows. Used by
//! `NestedSetService::verify()`, the `tree-inspect` tool and the tests that
//! check every mutation leaves a well-formed forest behind.

use crate::models::TreeNode;
use crate::services::error::NestedSetError;
use crate::services::NestedSetService;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// One broken invariant
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Violation {
    #[error("node {id}: left bound {left} is not below right bound {right}")]
    InvertedBounds { id: i64, left: i64, right: i64 },

    #[error("bound {bound} is used more than once in scope {scope:?}")]
    DuplicateBound { scope: Option<String>, bound: i64 },

    #[error("bounds of scope {scope:?} do not tile 1..={expected_max}; missing {missing:?}")]
    BoundsNotContiguous {
        scope: Option<String>,
        expected_max: i64,
        missing: Vec<i64>,
    },

    #[error("node {id}: bounds imply {expected} descendants, found {actual}")]
    DescendantCountMismatch { id: i64, expected: i64, actual: i64 },

    #[error("node {id}: parent {parent_id} does not exist")]
    MissingParent { id: i64, parent_id: i64 },

    #[error("node {id}: nearest enclosing node is {enclosing:?}, parent is {parent_id:?}")]
    ParentMismatch {
        id: i64,
        parent_id: Option<i64>,
        enclosing: Option<i64>,
    },

    #[error("node {id}: depth {actual}, expected {expected}")]
    DepthMismatch { id: i64, expected: i64, actual: i64 },
}

/// Result of an integrity check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub node_count: usize,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Nested set invariant checker
pub struct IntegrityChecker;

impl IntegrityChecker {
    /// Check every forest (one per scope value) in `nodes`
    pub fn check(nodes: &[TreeNode]) -> IntegrityReport {
        let mut forests: BTreeMap<Option<String>, Vec<&TreeNode>> = BTreeMap::new();
        for node in nodes {
            forests.entry(node.scope.clone()).or_default().push(node);
        }

        let mut violations = Vec::new();
        for (scope, mut forest) in forests {
            forest.sort_by_key(|node| node.left);
            Self::check_bounds(&scope, &forest, &mut violations);
            Self::check_structure(&forest, &mut violations);
        }

        IntegrityReport {
            node_count: nodes.len(),
            violations,
        }
    }

    fn check_bounds(scope: &Option<String>, forest: &[&TreeNode], violations: &mut Vec<Violation>) {
        let mut seen: BTreeMap<i64, usize> = BTreeMap::new();
        for node in forest {
            if node.left >= node.right {
                violations.push(Violation::InvertedBounds {
                    id: node.id,
                    left: node.left,
                    right: node.right,
                });
            }
            *seen.entry(node.left).or_default() += 1;
            *seen.entry(node.right).or_default() += 1;
        }

        for (bound, count) in &seen {
            if *count > 1 {
                violations.push(Violation::DuplicateBound {
                    scope: scope.clone(),
                    bound: *bound,
                });
            }
        }

        let expected_max = 2 * forest.len() as i64;
        let missing: Vec<i64> = (1..=expected_max)
            .filter(|bound| !seen.contains_key(bound))
            .collect();
        let out_of_range = seen.keys().any(|bound| *bound < 1 || *bound > expected_max);
        if !missing.is_empty() || out_of_range {
            violations.push(Violation::BoundsNotContiguous {
                scope: scope.clone(),
                expected_max,
                missing,
            });
        }
    }

    /// `forest` must be sorted by left bound
    fn check_structure(forest: &[&TreeNode], violations: &mut Vec<Violation>) {
        let by_id: HashMap<i64, &TreeNode> = forest.iter().map(|node| (node.id, *node)).collect();

        for (index, node) in forest.iter().enumerate() {
            let descendants = forest[index + 1..]
                .iter()
                .take_while(|other| other.left < node.right)
                .filter(|other| node.contains(other))
                .count() as i64;
            if descendants != node.children_count() {
                violations.push(Violation::DescendantCountMismatch {
                    id: node.id,
                    expected: node.children_count(),
                    actual: descendants,
                });
            }

            // Nearest enclosing node: the containing node with the largest left bound
            let enclosing = forest[..index]
                .iter()
                .rev()
                .find(|other| other.contains(node))
                .map(|other| other.id);

            match node.parent_id {
                Some(parent_id) => match by_id.get(&parent_id) {
                    None => violations.push(Violation::MissingParent {
                        id: node.id,
                        parent_id,
                    }),
                    Some(parent) => {
                        if enclosing != Some(parent_id) {
                            violations.push(Violation::ParentMismatch {
                                id: node.id,
                                parent_id: Some(parent_id),
                                enclosing,
                            });
                        }
                        if node.depth != parent.depth + 1 {
                            violations.push(Violation::DepthMismatch {
                                id: node.id,
                                expected: parent.depth + 1,
                                actual: node.depth,
                            });
                        }
                    }
                },
                None => {
                    if enclosing.is_some() {
                        violations.push(Violation::ParentMismatch {
                            id: node.id,
                            parent_id: None,
                            enclosing,
                        });
                    }
                    if node.depth != 0 {
                        violations.push(Violation::DepthMismatch {
                            id: node.id,
                            expected: 0,
                            actual: node.depth,
                        });
                    }
                }
            }
        }
    }
}

impl NestedSetService {
    /// Check the invariants of this service's forest over one snapshot
    pub async fn verify(&self) -> Result<IntegrityReport, NestedSetError> {
        let nodes = self.all().await?;
        let report = IntegrityChecker::check(&nodes);
        if !report.is_valid() {
            tracing::warn!(
                "Integrity check of '{}' found {} violations",
                self.schema().table(),
                report.violations.len()
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: i64, left: i64, right: i64, parent_id: Option<i64>, depth: i64) -> TreeNode {
        TreeNode {
            id,
            left,
            right,
            parent_id,
            depth,
            scope: None,
            payload: json!({}),
        }
    }

    #[test]
    fn test_valid_forest() {
        let nodes = vec![
            node(1, 1, 6, None, 0),
            node(2, 2, 3, Some(1), 1),
            node(3, 4, 5, Some(1), 1),
            node(4, 7, 8, None, 0),
        ];
        let report = IntegrityChecker::check(&nodes);
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.node_count, 4);
    }

    #[test]
    fn test_empty_forest_is_valid() {
        assert!(IntegrityChecker::check(&[]).is_valid());
    }

    #[test]
    fn test_gap_and_count_mismatch() {
        // Root claims two descendants but only one exists, leaving a gap
        let nodes = vec![node(1, 1, 6, None, 0), node(2, 2, 3, Some(1), 1)];
        let report = IntegrityChecker::check(&nodes);

        assert!(report.violations.iter().any(|v| matches!(
            v,
            Violation::DescendantCountMismatch { id: 1, expected: 2, actual: 1 }
        )));
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, Violation::BoundsNotContiguous { .. })));
    }

    #[test]
    fn test_parent_and_depth_mismatch() {
        let nodes = vec![
            node(1, 1, 6, None, 0),
            node(2, 2, 5, Some(1), 1),
            node(3, 3, 4, Some(1), 3),
        ];
        let report = IntegrityChecker::check(&nodes);

        assert!(report.violations.contains(&Violation::ParentMismatch {
            id: 3,
            parent_id: Some(1),
            enclosing: Some(2),
        }));
        assert!(report.violations.contains(&Violation::DepthMismatch {
            id: 3,
            expected: 1,
            actual: 3,
        }));
    }

    #[test]
    fn test_scopes_checked_independently() {
        let mut a = node(1, 1, 2, None, 0);
        a.scope = Some("a".to_string());
        let mut b = node(2, 1, 2, None, 0);
        b.scope = Some("b".to_string());

        assert!(IntegrityChecker::check(&[a, b]).is_valid());
    }

    #[test]
    fn test_violation_display() {
        let violation = Violation::InvertedBounds {
            id: 7,
            left: 4,
            right: 4,
        };
        assert_eq!(
            violation.to_string(),
            "node 7: left bound 4 is not below right bound 4"
        );
    }
}
