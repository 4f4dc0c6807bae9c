//! Nested Set Tree Engine
//!
//! This crate maintains hierarchical trees inside a flat relational table
//! using the nested set (interval) encoding: every node carries a left and a
//! right bound, and a node's interval strictly contains the intervals of all
//! its descendants. Ancestor, descendant and sibling queries become range
//! comparisons; structural mutations become transactional range shifts.
//!
//! # Architecture
//!
//! - **Explicit Bindings**: A `SchemaDescriptor` maps logical roles (left,
//!   right, parent, depth, scope) to physical columns and is passed into
//!   every store call
//! - **Narrow Store Contract**: The engine talks to a `TreeStore` through
//!   typed predicates and assignments; libsql and in-memory adapters ship
//!   with the crate
//! - **One Transaction per Operation**: Every mutation is all-or-nothing
//!
//! # Modules
//!
//! - [`models`] - Data structures (TreeNode, SchemaDescriptor, predicates)
//! - [`config`] - Serde-backed column binding configuration
//! - [`db`] - Store abstraction and adapters
//! - [`services`] - The nested set engine (queries, mutations, integrity)

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{ConfigError, NestedSetConfig};
pub use db::{MemoryTreeStore, StoreError, TreeStore, TursoTreeStore};
pub use models::*;
pub use services::*;
