//! Nested Set Service
//!
//! `NestedSetService` is the handle clients hold to operate on one forest:
//! a store, the column bindings of its table and the scope value selecting
//! the forest inside that table. Queries live in `query_service`, structural
//! mutations in `mutation_service`; both are `impl NestedSetService` blocks
//! built on the transaction helpers defined here.
//!
//! # Examples
//!
//! ```rust,no_run
//! use nestedset_core::db::{TreeStore, TursoTreeStore};
//! use nestedset_core::models::SchemaDescriptor;
//! use nestedset_core::services::NestedSetService;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn TreeStore> = Arc::new(TursoTreeStore::new_in_memory().await?);
//!     let service = NestedSetService::new(store, Arc::new(SchemaDescriptor::default()));
//!     service.initialize().await?;
//!
//!     let root = service.insert_root(json!({"title": "Catalog"})).await?;
//!     let child = service.insert_child(json!({"title": "Books"}), root.id).await?;
//!     assert_eq!(service.ancestors(&child).await?.len(), 1);
//!     Ok(())
//! }
//! ```

use crate::db::{StoreTransaction, TreeStore};
use crate::models::{OrderBy, Predicate, SchemaDescriptor, TreeNode};
use crate::services::error::NestedSetError;
use std::sync::Arc;

/// Handle on one nested set forest
#[derive(Clone)]
pub struct NestedSetService {
    store: Arc<dyn TreeStore>,
    schema: Arc<SchemaDescriptor>,
    scope: Option<String>,
}

impl NestedSetService {
    /// Create a service over the unscoped forest of `schema`'s table
    pub fn new(store: Arc<dyn TreeStore>, schema: Arc<SchemaDescriptor>) -> Self {
        Self {
            store,
            schema,
            scope: None,
        }
    }

    /// Restrict every operation to the forest whose scope column equals `scope`
    ///
    /// Has no effect on a schema without a scope column.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Create the backing table if the store needs one
    pub async fn initialize(&self) -> Result<(), NestedSetError> {
        self.store.ensure_table(&self.schema).await?;
        Ok(())
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Restrict `predicate` to this service's forest
    pub(crate) fn scoped(&self, predicate: Predicate) -> Predicate {
        Predicate::Scope(self.scope.clone()).and(predicate)
    }

    pub(crate) async fn begin(&self) -> Result<Box<dyn StoreTransaction>, NestedSetError> {
        Ok(self.store.begin().await?)
    }

    pub(crate) async fn begin_read(&self) -> Result<Box<dyn StoreTransaction>, NestedSetError> {
        Ok(self.store.begin_read().await?)
    }

    /// Commit on success, roll back on failure
    ///
    /// A failed rollback is logged; the original error is returned.
    pub(crate) async fn finish<T>(
        &self,
        tx: Box<dyn StoreTransaction>,
        result: Result<T, NestedSetError>,
        operation: &str,
    ) -> Result<T, NestedSetError> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!("Rolling back {} on '{}': {}", operation, self.schema.table(), e);
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Rollback of {} failed: {}", operation, rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Read every matching row of this forest inside its own snapshot
    pub(crate) async fn read_all(
        &self,
        predicate: Predicate,
        order: OrderBy,
    ) -> Result<Vec<TreeNode>, NestedSetError> {
        let mut tx = self.begin_read().await?;
        let result = tx
            .find_all(&self.schema, &self.scoped(predicate), order)
            .await
            .map_err(NestedSetError::from);
        self.finish(tx, result, "read").await
    }

    pub(crate) async fn read_one(
        &self,
        predicate: Predicate,
        order: OrderBy,
    ) -> Result<Option<TreeNode>, NestedSetError> {
        let mut tx = self.begin_read().await?;
        let result = tx
            .find_one(&self.schema, &self.scoped(predicate), order)
            .await
            .map_err(NestedSetError::from);
        self.finish(tx, result, "read").await
    }

    /// Fetch a node of this forest inside an open transaction
    ///
    /// A row that belongs to another scope is treated as absent.
    pub(crate) async fn load(
        &self,
        tx: &mut dyn StoreTransaction,
        id: i64,
    ) -> Result<Option<TreeNode>, NestedSetError> {
        let node = tx.reload(&self.schema, id).await?;
        Ok(node.filter(|node| self.owns(node)))
    }

    /// Whether `node` lies in this service's forest
    fn owns(&self, node: &TreeNode) -> bool {
        self.schema.scope_column().is_none() || node.scope == self.scope
    }

    /// Like `load`, but a missing node is an error
    pub(crate) async fn load_existing(
        &self,
        tx: &mut dyn StoreTransaction,
        id: i64,
    ) -> Result<TreeNode, NestedSetError> {
        self.load(tx, id)
            .await?
            .ok_or_else(|| NestedSetError::node_not_found(id))
    }
}

impl std::fmt::Debug for NestedSetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestedSetService")
            .field("schema", &self.schema)
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryTreeStore;
    use serde_json::json;

    fn scoped_services() -> (NestedSetService, NestedSetService) {
        let store: Arc<dyn TreeStore> = Arc::new(MemoryTreeStore::new());
        let schema = Arc::new(
            SchemaDescriptor::builder("menu_items")
                .scope_column("menu")
                .build()
                .unwrap(),
        );
        (
            NestedSetService::new(store.clone(), schema.clone()).with_scope("main"),
            NestedSetService::new(store, schema).with_scope("footer"),
        )
    }

    #[tokio::test]
    async fn test_load_ignores_rows_of_other_scopes() {
        let (main, footer) = scoped_services();
        main.initialize().await.unwrap();
        let home = main.insert_root(json!({"title": "home"})).await.unwrap();

        let mut tx = footer.begin_read().await.unwrap();
        let seen_from_footer = footer.load(tx.as_mut(), home.id).await.unwrap();
        let seen_from_main = main.load(tx.as_mut(), home.id).await.unwrap();
        tx.commit().await.unwrap();

        assert!(seen_from_footer.is_none());
        assert_eq!(seen_from_main, Some(home));
    }

    #[tokio::test]
    async fn test_load_existing_reports_missing_id() {
        let (main, _footer) = scoped_services();
        main.initialize().await.unwrap();

        let mut tx = main.begin_read().await.unwrap();
        let err = main.load_existing(tx.as_mut(), 99).await.unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(err, NestedSetError::NodeNotFound { id: 99 }));
    }

    #[tokio::test]
    async fn test_scope_is_ignored_without_scope_column() {
        let store: Arc<dyn TreeStore> = Arc::new(MemoryTreeStore::new());
        let service = NestedSetService::new(store, Arc::new(SchemaDescriptor::default()))
            .with_scope("unused");
        service.initialize().await.unwrap();
        let root = service.insert_root(json!({"title": "root"})).await.unwrap();

        let mut tx = service.begin_read().await.unwrap();
        let loaded = service.load(tx.as_mut(), root.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(loaded.map(|n| n.id), Some(root.id));
    }
}
