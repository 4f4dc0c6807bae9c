//! Schema Descriptor
//!
//! Immutable binding of the logical nested set roles (identity, left, right,
//! parent, depth, payload, optional scope) to physical column names. Every
//! store call receives the descriptor explicitly; nothing resolves column
//! names from ambient state.

use crate::config::ConfigError;
use crate::models::predicate::Field;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const DEFAULT_TABLE: &str = "nested_set";
pub const DEFAULT_ID_COLUMN: &str = "id";
pub const DEFAULT_LEFT_COLUMN: &str = "lft";
pub const DEFAULT_RIGHT_COLUMN: &str = "rgt";
pub const DEFAULT_PARENT_COLUMN: &str = "parent_id";
pub const DEFAULT_DEPTH_COLUMN: &str = "depth";
pub const DEFAULT_PAYLOAD_COLUMN: &str = "payload";

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn identifier_pattern() -> &'static Regex {
    static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER_REGEX.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).unwrap())
}

/// Column bindings for one nested set table.
///
/// Two descriptors with different bindings drive the engine identically; only
/// the rendered column names differ.
///
/// # Examples
///
/// ```rust
/// # use nestedset_core::models::SchemaDescriptor;
/// let schema = SchemaDescriptor::builder("ns_mixins")
///     .left_column("l")
///     .right_column("r")
///     .parent_column("p")
///     .scope_column("root_id")
///     .build()
///     .unwrap();
///
/// assert_eq!(schema.left_column(), "l");
/// assert_eq!(schema.depth_column(), "depth");
/// assert_eq!(schema.scope_column(), Some("root_id"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    table: String,
    id_column: String,
    left_column: String,
    right_column: String,
    parent_column: String,
    depth_column: String,
    payload_column: String,
    scope_column: Option<String>,
}

impl SchemaDescriptor {
    /// Start a descriptor for `table` with the default column names
    pub fn builder(table: impl Into<String>) -> SchemaDescriptorBuilder {
        SchemaDescriptorBuilder {
            table: table.into(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            left_column: DEFAULT_LEFT_COLUMN.to_string(),
            right_column: DEFAULT_RIGHT_COLUMN.to_string(),
            parent_column: DEFAULT_PARENT_COLUMN.to_string(),
            depth_column: DEFAULT_DEPTH_COLUMN.to_string(),
            payload_column: DEFAULT_PAYLOAD_COLUMN.to_string(),
            scope_column: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn left_column(&self) -> &str {
        &self.left_column
    }

    pub fn right_column(&self) -> &str {
        &self.right_column
    }

    pub fn parent_column(&self) -> &str {
        &self.parent_column
    }

    pub fn depth_column(&self) -> &str {
        &self.depth_column
    }

    pub fn payload_column(&self) -> &str {
        &self.payload_column
    }

    pub fn scope_column(&self) -> Option<&str> {
        self.scope_column.as_deref()
    }

    /// Physical column bound to a logical field
    pub fn column(&self, field: Field) -> &str {
        match field {
            Field::Id => &self.id_column,
            Field::Left => &self.left_column,
            Field::Right => &self.right_column,
            Field::Parent => &self.parent_column,
            Field::Depth => &self.depth_column,
        }
    }
}

impl Default for SchemaDescriptor {
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

/// Builder for [`SchemaDescriptor`]; `build()` validates every identifier.
#[derive(Debug, Clone)]
pub struct SchemaDescriptorBuilder {
    table: String,
    id_column: String,
    left_column: String,
    right_column: String,
    parent_column: String,
    depth_column: String,
    payload_column: String,
    scope_column: Option<String>,
}

impl SchemaDescriptorBuilder {
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn left_column(mut self, column: impl Into<String>) -> Self {
        self.left_column = column.into();
        self
    }

    pub fn right_column(mut self, column: impl Into<String>) -> Self {
        self.right_column = column.into();
        self
    }

    pub fn parent_column(mut self, column: impl Into<String>) -> Self {
        self.parent_column = column.into();
        self
    }

    pub fn depth_column(mut self, column: impl Into<String>) -> Self {
        self.depth_column = column.into();
        self
    }

    pub fn payload_column(mut self, column: impl Into<String>) -> Self {
        self.payload_column = column.into();
        self
    }

    pub fn scope_column(mut self, column: impl Into<String>) -> Self {
        self.scope_column = Some(column.into());
        self
    }

    /// Validate identifiers and produce the immutable descriptor
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidIdentifier` if a name is not a plain SQL identifier
    /// - `ConfigError::DuplicateColumn` if two roles share one column
    pub fn build(self) -> Result<SchemaDescriptor, ConfigError> {
        validate_identifier("table", &self.table)?;

        let mut columns: Vec<(&str, &str)> = vec![
            ("id", self.id_column.as_str()),
            ("left", self.left_column.as_str()),
            ("right", self.right_column.as_str()),
            ("parent", self.parent_column.as_str()),
            ("depth", self.depth_column.as_str()),
            ("payload", self.payload_column.as_str()),
        ];
        if let Some(scope) = &self.scope_column {
            columns.push(("scope", scope.as_str()));
        }

        let mut seen = HashSet::new();
        for (role, column) in &columns {
            validate_identifier(role, column)?;
            if !seen.insert(column.to_ascii_lowercase()) {
                return Err(ConfigError::duplicate_column(*column));
            }
        }

        Ok(SchemaDescriptor {
            table: self.table,
            id_column: self.id_column,
            left_column: self.left_column,
            right_column: self.right_column,
            parent_column: self.parent_column,
            depth_column: self.depth_column,
            payload_column: self.payload_column,
            scope_column: self.scope_column,
        })
    }
}

fn validate_identifier(role: &str, value: &str) -> Result<(), ConfigError> {
    if identifier_pattern().is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::invalid_identifier(role, value))
    }
}
