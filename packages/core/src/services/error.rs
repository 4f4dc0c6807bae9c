//! Service Layer Error Types
//!
//! This module defines error types for nested set operations. Validation
//! failures are raised before any write reaches the store; store failures
//! are propagated unmodified.

use crate::db::StoreError;
use thiserror::Error;

/// Nested set operation errors
#[derive(Error, Debug)]
pub enum NestedSetError {
    /// Operation not allowed for the given node(s)
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Swap requested for two nodes with different parents
    #[error("Nodes {first_id} and {second_id} are not siblings")]
    NotSiblings { first_id: i64, second_id: i64 },

    /// Sort key missing from at least one child payload
    #[error("Unsupported sort key: '{key}'")]
    UnsupportedKey { key: String },

    /// Node referenced by a mutation does not exist
    #[error("Node not found: {id}")]
    NodeNotFound { id: i64 },

    /// Store adapter failure
    #[error("Store operation failed: {0}")]
    StoreFailure(#[from] StoreError),
}

impl NestedSetError {
    /// Create an invalid operation error
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    pub fn not_siblings(first_id: i64, second_id: i64) -> Self {
        Self::NotSiblings {
            first_id,
            second_id,
        }
    }

    pub fn unsupported_key(key: impl Into<String>) -> Self {
        Self::UnsupportedKey { key: key.into() }
    }

    /// Create a node not found error
    pub fn node_not_found(id: i64) -> Self {
        Self::NodeNotFound { id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            NestedSetError::not_siblings(3, 7).to_string(),
            "Nodes 3 and 7 are not siblings"
        );
        assert_eq!(
            NestedSetError::unsupported_key("title").to_string(),
            "Unsupported sort key: 'title'"
        );
        assert_eq!(
            NestedSetError::invalid_operation("node is not persisted").to_string(),
            "Invalid operation: node is not persisted"
        );
    }

    #[test]
    fn test_store_error_propagates() {
        let err: NestedSetError = StoreError::transaction_failed("disk full").into();
        match err {
            NestedSetError::StoreFailure(StoreError::TransactionFailed { context }) => {
                assert_eq!(context, "disk full")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
