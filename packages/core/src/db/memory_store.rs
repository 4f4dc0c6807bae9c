//! In-memory TreeStore
//!
//! Rows live in a map keyed by table name. A transaction takes the store lock
//! for its whole lifetime and snapshots the tables at `begin()`; `rollback()`
//! (or dropping the transaction) restores the snapshot.
//!
//! The store can be told to fail after a number of writes, which lets tests
//! check that a mutation interrupted halfway leaves the forest untouched.

use crate::db::tree_store::{NewTreeRow, StoreTransaction, TreeStore};
use crate::db::StoreError;
use crate::models::{Assignment, OrderBy, Predicate, SchemaDescriptor, TreeNode};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<TreeNode>>,
    last_id: i64,
    /// Writes allowed before every further write fails
    writes_remaining: Option<usize>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    tables: HashMap<String, Vec<TreeNode>>,
    last_id: i64,
}

/// TreeStore backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryTreeStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `writes` more writes succeed, then fail every write after them
    pub async fn fail_after_writes(&self, writes: usize) {
        self.state.lock().await.writes_remaining = Some(writes);
    }

    /// Stop injecting write failures
    pub async fn clear_failure(&self) {
        self.state.lock().await.writes_remaining = None;
    }

    /// Copy of every row in `table`, in insertion order
    pub async fn rows(&self, table: &str) -> Vec<TreeNode> {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    async fn ensure_table(&self, schema: &SchemaDescriptor) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .tables
            .entry(schema.table().to_string())
            .or_default();
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let state = self.state.clone().lock_owned().await;
        let snapshot = Snapshot {
            tables: state.tables.clone(),
            last_id: state.last_id,
        };
        Ok(Box::new(MemoryTransaction {
            state: Some(state),
            snapshot: Some(snapshot),
        }))
    }
}

struct MemoryTransaction {
    state: Option<OwnedMutexGuard<MemoryState>>,
    snapshot: Option<Snapshot>,
}

impl MemoryTransaction {
    fn state(&mut self) -> Result<&mut MemoryState, StoreError> {
        self.state
            .as_deref_mut()
            .ok_or_else(|| StoreError::transaction_failed("Transaction already finished"))
    }

    fn table(&mut self, schema: &SchemaDescriptor) -> Result<&mut Vec<TreeNode>, StoreError> {
        self.state()?
            .tables
            .get_mut(schema.table())
            .ok_or_else(|| StoreError::sql_execution(format!("no such table: {}", schema.table())))
    }

    /// Spend one write from the failure budget, if one is set
    fn charge_write(&mut self) -> Result<(), StoreError> {
        let state = self.state()?;
        match state.writes_remaining {
            Some(0) => Err(StoreError::transaction_failed("injected write failure")),
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn select(
        &mut self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
        order: OrderBy,
    ) -> Result<Vec<TreeNode>, StoreError> {
        let mut matching: Vec<TreeNode> = self
            .table(schema)?
            .iter()
            .filter(|node| row_matches(schema, predicate, node))
            .cloned()
            .collect();
        matching.sort_by(|a, b| order.compare(a, b));
        Ok(matching)
    }

    fn restore(&mut self) {
        if let (Some(state), Some(snapshot)) = (self.state.as_deref_mut(), self.snapshot.take()) {
            state.tables = snapshot.tables;
            state.last_id = snapshot.last_id;
        }
    }
}

/// Scope filters only bind when the schema has a scope column
fn row_matches(schema: &SchemaDescriptor, predicate: &Predicate, node: &TreeNode) -> bool {
    match predicate {
        Predicate::Scope(_) if schema.scope_column().is_none() => true,
        Predicate::And(parts) => parts.iter().all(|part| row_matches(schema, part, node)),
        other => other.matches(node),
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_one(
        &mut self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
        order: OrderBy,
    ) -> Result<Option<TreeNode>, StoreError> {
        Ok(self.select(schema, predicate, order)?.into_iter().next())
    }

    async fn find_all(
        &mut self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
        order: OrderBy,
    ) -> Result<Vec<TreeNode>, StoreError> {
        self.select(schema, predicate, order)
    }

    async fn insert_returning_id(
        &mut self,
        schema: &SchemaDescriptor,
        row: &NewTreeRow,
    ) -> Result<i64, StoreError> {
        self.charge_write()?;
        self.table(schema)?;

        let state = self.state()?;
        state.last_id += 1;
        let id = state.last_id;

        let node = TreeNode {
            id,
            left: row.left,
            right: row.right,
            parent_id: row.parent_id,
            depth: row.depth,
            scope: schema.scope_column().and(row.scope.clone()),
            payload: row.payload.clone(),
        };
        self.table(schema)?.push(node);
        Ok(id)
    }

    async fn update_all(
        &mut self,
        schema: &SchemaDescriptor,
        assignments: &[Assignment],
        predicate: &Predicate,
    ) -> Result<u64, StoreError> {
        self.charge_write()?;

        let mut updated = 0;
        for node in self.table(schema)?.iter_mut() {
            if row_matches(schema, predicate, node) {
                Assignment::apply_all(assignments, node);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_all(
        &mut self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
    ) -> Result<u64, StoreError> {
        self.charge_write()?;

        let table = self.table(schema)?;
        let before = table.len();
        table.retain(|node| !row_matches(schema, predicate, node));
        Ok((before - table.len()) as u64)
    }

    async fn reload(
        &mut self,
        schema: &SchemaDescriptor,
        id: i64,
    ) -> Result<Option<TreeNode>, StoreError> {
        Ok(self
            .table(schema)?
            .iter()
            .find(|node| node.id == id)
            .cloned())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        this.snapshot = None;
        this.state = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        this.restore();
        this.state = None;
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        // Uncommitted writes never become visible
        self.restore();
    }
}
