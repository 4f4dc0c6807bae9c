/// Configuration for nested set column bindings
use crate::models::{
    SchemaDescriptor, DEFAULT_DEPTH_COLUMN, DEFAULT_ID_COLUMN, DEFAULT_LEFT_COLUMN,
    DEFAULT_PARENT_COLUMN, DEFAULT_PAYLOAD_COLUMN, DEFAULT_RIGHT_COLUMN, DEFAULT_TABLE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A table or column name is not a plain SQL identifier
    #[error("Invalid {role} identifier: '{value}'")]
    InvalidIdentifier { role: String, value: String },

    /// Two logical roles are bound to the same column
    #[error("Column '{column}' is bound to more than one role")]
    DuplicateColumn { column: String },

    /// Failed to read a configuration file
    #[error("Failed to read configuration from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration is not valid JSON for this shape
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn invalid_identifier(role: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            role: role.into(),
            value: value.into(),
        }
    }

    pub fn duplicate_column(column: impl Into<String>) -> Self {
        Self::DuplicateColumn {
            column: column.into(),
        }
    }
}

/// Column bindings for one nested set table, as read from configuration.
///
/// Every field has a default, so `{}` is a valid configuration describing a
/// `nested_set` table with `lft`/`rgt`/`parent_id`/`depth` columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestedSetConfig {
    /// Table holding the forest rows
    pub table: String,

    pub id_column: String,

    /// Left boundary column (default: `lft`)
    pub left_column: String,

    /// Right boundary column (default: `rgt`)
    pub right_column: String,

    /// Parent reference column (default: `parent_id`)
    pub parent_column: String,

    pub depth_column: String,

    /// JSON payload column
    pub payload_column: String,

    /// Column partitioning the table into independent forests
    pub scope_column: Option<String>,
}

impl Default for NestedSetConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            left_column: DEFAULT_LEFT_COLUMN.to_string(),
            right_column: DEFAULT_RIGHT_COLUMN.to_string(),
            parent_column: DEFAULT_PARENT_COLUMN.to_string(),
            depth_column: DEFAULT_DEPTH_COLUMN.to_string(),
            payload_column: DEFAULT_PAYLOAD_COLUMN.to_string(),
            scope_column: None,
        }
    }
}

impl NestedSetConfig {
    /// Parse configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read configuration from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_schema().map(|_| ())
    }

    /// Build the immutable descriptor used by the engine and store adapters
    pub fn to_schema(&self) -> Result<SchemaDescriptor, ConfigError> {
        let mut builder = SchemaDescriptor::builder(&self.table)
            .id_column(&self.id_column)
            .left_column(&self.left_column)
            .right_column(&self.right_column)
            .parent_column(&self.parent_column)
            .depth_column(&self.depth_column)
            .payload_column(&self.payload_column);
        if let Some(scope) = &self.scope_column {
            builder = builder.scope_column(scope);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = NestedSetConfig::from_json_str("{}").unwrap();
        assert_eq!(config, NestedSetConfig::default());
        assert_eq!(config.to_schema().unwrap(), SchemaDescriptor::default());
    }

    #[test]
    fn test_partial_override() {
        let config = NestedSetConfig::from_json_str(
            r#"{"table": "ns_mixins", "left_column": "l", "right_column": "r", "parent_column": "p", "scope_column": "root_id"}"#,
        )
        .unwrap();

        let schema = config.to_schema().unwrap();
        assert_eq!(schema.table(), "ns_mixins");
        assert_eq!(schema.left_column(), "l");
        assert_eq!(schema.right_column(), "r");
        assert_eq!(schema.parent_column(), "p");
        assert_eq!(schema.depth_column(), "depth");
        assert_eq!(schema.scope_column(), Some("root_id"));
    }

    #[test]
    fn test_validate_rejects_bad_column() {
        let config = NestedSetConfig {
            left_column: "left bound".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_parse_error() {
        let err = NestedSetConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"table": "categories"}}"#).unwrap();

        let config = NestedSetConfig::from_path(file.path()).unwrap();
        assert_eq!(config.table, "categories");
        assert_eq!(config.left_column, "lft");

        let missing = NestedSetConfig::from_path("/nonexistent/nestedset.json").unwrap_err();
        assert!(matches!(missing, ConfigError::ReadFailed { .. }));
    }
}
