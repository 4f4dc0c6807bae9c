//! Store Error Types
//!
//! This module defines error types for store adapter operations, covering
//! connection, initialization, SQL execution, row decoding and transaction
//! failures. The engine propagates these unmodified.

use std::path::PathBuf;
use thiserror::Error;

/// Store adapter errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize the nested set table
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A row could not be converted into a node
    #[error("Failed to decode row: {context}")]
    RowDecodeFailed { context: String },

    /// Payload could not be serialized or parsed
    #[error("Payload serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Transaction could not begin, commit or roll back
    #[error("Transaction failed: {context}")]
    TransactionFailed { context: String },
}

impl StoreError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    pub fn row_decode(context: impl Into<String>) -> Self {
        Self::RowDecodeFailed {
            context: context.into(),
        }
    }

    pub fn transaction_failed(context: impl Into<String>) -> Self {
        Self::TransactionFailed {
            context: context.into(),
        }
    }
}
