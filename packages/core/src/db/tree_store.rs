//! TreeStore Trait - Store Adapter Abstraction
//!
//! This module defines the narrow transactional interface the nested set
//! engine needs from a record store. The engine never issues raw queries; it
//! builds typed predicates and assignments (see [`crate::models::predicate`])
//! and hands them to a transaction together with the schema descriptor.
//!
//! # Architecture
//!
//! - **Abstraction Point**: Between `NestedSetService` (range arithmetic) and
//!   the record store
//! - **Multiple Backends**: `TursoTreeStore` (libsql) and `MemoryTreeStore`
//! - **Explicit Bindings**: Every call receives the `SchemaDescriptor`, so one
//!   store can host any number of differently-bound tables
//!
//! # Transactions
//!
//! `TreeStore::begin()` hands out an exclusive `StoreTransaction`. Adapters
//! serialize transactions that touch the same forest, so the engine may read
//! the current maximum right bound and rely on it until commit. Dropping a
//! transaction without `commit()` discards its writes.
//!
//! Queries use `TreeStore::begin_read()`, which must still give a consistent
//! snapshot but need not lock out writers of other processes.
//!
//! # Examples
//!
//! ```rust,no_run
//! use nestedset_core::db::{TreeStore, TursoTreeStore};
//! use nestedset_core::models::{OrderBy, Predicate, SchemaDescriptor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let schema = SchemaDescriptor::default();
//!     let store: Arc<dyn TreeStore> = Arc::new(TursoTreeStore::new_in_memory().await?);
//!     store.ensure_table(&schema).await?;
//!
//!     let mut tx = store.begin().await?;
//!     let everything = tx.find_all(&schema, &Predicate::All, OrderBy::default()).await?;
//!     tx.commit().await?;
//!
//!     println!("{} nodes", everything.len());
//!     Ok(())
//! }
//! ```

use crate::db::StoreError;
use crate::models::{Assignment, OrderBy, Predicate, SchemaDescriptor, TreeNode};
use async_trait::async_trait;

/// Row values for `insert_returning_id`
#[derive(Debug, Clone, PartialEq)]
pub struct NewTreeRow {
    pub left: i64,
    pub right: i64,
    pub parent_id: Option<i64>,
    pub depth: i64,
    pub scope: Option<String>,
    pub payload: serde_json::Value,
}

/// Transactional record store the engine runs against
///
/// Implementations must be `Send + Sync` so the engine can be shared across
/// tasks behind an `Arc`.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Create the backing table for `schema` if the store needs one
    async fn ensure_table(&self, schema: &SchemaDescriptor) -> Result<(), StoreError>;

    /// Begin an atomic, isolated transaction
    ///
    /// # Errors
    ///
    /// Returns `StoreError::TransactionFailed` if the store cannot start one
    /// (for example when the database stays locked past its busy timeout).
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// Begin a transaction that only reads
    ///
    /// Adapters with a cheaper read path (a deferred `BEGIN` that does not
    /// take the write lock) override this; the default is a full `begin()`.
    async fn begin_read(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        self.begin().await
    }
}

/// One open transaction
///
/// Reads observe the transaction's own writes. All writes become visible to
/// other transactions at `commit()`, or never.
#[async_trait]
pub trait StoreTransaction: Send {
    /// First row matching `predicate` under `order`
    async fn find_one(
        &mut self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
        order: OrderBy,
    ) -> Result<Option<TreeNode>, StoreError>;

    /// All rows matching `predicate` under `order`
    async fn find_all(
        &mut self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
        order: OrderBy,
    ) -> Result<Vec<TreeNode>, StoreError>;

    /// Insert a row and return its store-assigned identity
    async fn insert_returning_id(
        &mut self,
        schema: &SchemaDescriptor,
        row: &NewTreeRow,
    ) -> Result<i64, StoreError>;

    /// Apply `assignments` to every row matching `predicate`
    ///
    /// Returns the number of rows updated.
    async fn update_all(
        &mut self,
        schema: &SchemaDescriptor,
        assignments: &[Assignment],
        predicate: &Predicate,
    ) -> Result<u64, StoreError>;

    /// Delete every row matching `predicate`; returns the number deleted
    async fn delete_all(
        &mut self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
    ) -> Result<u64, StoreError>;

    /// Fetch one row by identity
    ///
    /// - `Ok(Some(node))` if the row exists
    /// - `Ok(None)` if it doesn't (not an error)
    async fn reload(
        &mut self,
        schema: &SchemaDescriptor,
        id: i64,
    ) -> Result<Option<TreeNode>, StoreError>;

    /// Make every write of this transaction durable and visible
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every write of this transaction
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
