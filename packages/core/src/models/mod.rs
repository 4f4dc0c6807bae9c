//! Data Models
//!
//! This module contains the data structures shared by the engine and the
//! store adapters:
//!
//! - `TreeNode` - One row of a nested set forest
//! - `SchemaDescriptor` - Column bindings for a nested set table
//! - `Predicate` / `Assignment` / `OrderBy` - Typed store operations

mod node;
pub mod predicate;
mod schema;

pub use node::{compare_payload_values, SortDirection, TreeNode};
pub use predicate::{Assignment, Comparison, Direction, Field, OrderBy, Predicate};
pub use schema::{
    SchemaDescriptor, SchemaDescriptorBuilder, DEFAULT_DEPTH_COLUMN, DEFAULT_ID_COLUMN,
    DEFAULT_LEFT_COLUMN, DEFAULT_PARENT_COLUMN, DEFAULT_PAYLOAD_COLUMN, DEFAULT_RIGHT_COLUMN,
    DEFAULT_TABLE,
};
