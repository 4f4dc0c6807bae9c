//! Store Layer
//!
//! This module handles every interaction with the record store:
//!
//! - The `TreeStore` / `StoreTransaction` abstraction the engine runs against
//! - `TursoTreeStore`, the libsql (Turso) adapter rendering typed predicates
//!   into parameterized SQL
//! - `MemoryTreeStore`, a process-local adapter with snapshot rollback and
//!   write-failure injection for tests
//!
//! # Architecture
//!
//! The engine owns all interval arithmetic. Adapters only filter, order,
//! update and delete rows, and must run each transaction atomically and in
//! isolation from concurrent transactions on the same forest.

mod error;
mod memory_store;
mod tree_store;
mod turso_store;

pub use error::StoreError;
pub use memory_store::MemoryTreeStore;
pub use tree_store::{NewTreeRow, StoreTransaction, TreeStore};
pub use turso_store::TursoTreeStore;
