//! TursoTreeStore - TreeStore Implementation for Turso/libsql Backend
//!
//! This module implements the `TreeStore` trait for a libsql database. It
//! renders the engine's typed predicates and assignments into parameterized
//! SQL using the column names of the `SchemaDescriptor` passed to each call.
//!
//! # Design Principles
//!
//! 1. **Single Connection**: The store owns one connection behind a
//!    `tokio::sync::Mutex`; a transaction holds the lock until it finishes,
//!    which serializes every mutation issued through this store
//! 2. **Write Transactions**: `BEGIN IMMEDIATE` takes the database write lock
//!    up front, so the maximum right bound read at the start of an insert
//!    stays valid across processes as well. Read transactions use a deferred
//!    `BEGIN` and leave other writers alone
//! 3. **Busy Timeout**: 5 seconds, so a locked database makes `begin()` wait
//!    and then fail rather than fail immediately
//! 4. **Parameterized Values**: Only validated identifiers are interpolated;
//!    every value travels as a bound parameter
//!
//! # Examples
//!
//! ```rust,no_run
//! use nestedset_core::db::{TreeStore, TursoTreeStore};
//! use nestedset_core::models::SchemaDescriptor;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = TursoTreeStore::new(PathBuf::from("./data/tree.db")).await?;
//!     store.ensure_table(&SchemaDescriptor::default()).await?;
//!     Ok(())
//! }
//! ```

use crate::db::tree_store::{NewTreeRow, StoreTransaction, TreeStore};
use crate::db::StoreError;
use crate::models::{
    Assignment, Direction, Field, OrderBy, Predicate, SchemaDescriptor, TreeNode,
};
use async_trait::async_trait;
use libsql::params::Params;
use libsql::{Builder, Connection, Database, Row, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

const IN_MEMORY_PATH: &str = ":memory:";

/// TursoTreeStore implements TreeStore for a libsql database
pub struct TursoTreeStore {
    /// Database handle (kept alive for the connection's lifetime)
    _db: Arc<Database>,

    /// The single connection all transactions run on
    conn: Arc<Mutex<Connection>>,

    /// Path to the database file (`:memory:` for in-memory databases)
    db_path: PathBuf,
}

impl TursoTreeStore {
    /// Open or create a database file
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Enable WAL mode and a 5 second busy timeout
    ///
    /// Tables are created per schema with [`TreeStore::ensure_table`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Connection configuration fails
    pub async fn new(db_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        StoreError::permission_denied(db_path.clone())
                    } else {
                        StoreError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| StoreError::connection_failed(db_path.clone(), e))?;

        Self::open(db, db_path).await
    }

    /// Open a private in-memory database (lives as long as the store)
    pub async fn new_in_memory() -> Result<Self, StoreError> {
        let db_path = PathBuf::from(IN_MEMORY_PATH);
        let db = Builder::new_local(IN_MEMORY_PATH)
            .build()
            .await
            .map_err(|e| StoreError::connection_failed(db_path.clone(), e))?;

        Self::open(db, db_path).await
    }

    async fn open(db: Database, db_path: PathBuf) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::connection_failed(db_path.clone(), e))?;

        execute_pragma(&conn, "PRAGMA journal_mode = WAL").await?;
        execute_pragma(&conn, "PRAGMA busy_timeout = 5000").await?;

        tracing::info!("Opened nested set store at {}", db_path.display());

        Ok(Self {
            _db: Arc::new(db),
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Execute a PRAGMA statement
///
/// PRAGMA statements return rows, so we must use query() instead of execute().
async fn execute_pragma(conn: &Connection, pragma: &str) -> Result<(), StoreError> {
    let mut stmt = conn
        .prepare(pragma)
        .await
        .map_err(|e| StoreError::sql_execution(format!("Failed to execute '{}': {}", pragma, e)))?;
    let _ = stmt
        .query(())
        .await
        .map_err(|e| StoreError::sql_execution(format!("Failed to execute '{}': {}", pragma, e)))?;
    Ok(())
}

#[async_trait]
impl TreeStore for TursoTreeStore {
    async fn ensure_table(&self, schema: &SchemaDescriptor) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let table = quote(schema.table());

        let scope_definition = schema
            .scope_column()
            .map(|column| format!("{} TEXT,", quote(column)))
            .unwrap_or_default();

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                {id} INTEGER PRIMARY KEY AUTOINCREMENT,
                {left} INTEGER NOT NULL,
                {right} INTEGER NOT NULL,
                {parent} INTEGER,
                {depth} INTEGER NOT NULL DEFAULT 0,
                {scope}
                {payload} TEXT NOT NULL DEFAULT '{{}}'
            )",
            table = table,
            id = quote(schema.id_column()),
            left = quote(schema.left_column()),
            right = quote(schema.right_column()),
            parent = quote(schema.parent_column()),
            depth = quote(schema.depth_column()),
            scope = scope_definition,
            payload = quote(schema.payload_column()),
        );
        conn.execute(&create, ()).await.map_err(|e| {
            StoreError::initialization_failed(format!(
                "Failed to create table {}: {}",
                schema.table(),
                e
            ))
        })?;

        let mut indexed = vec![
            schema.left_column(),
            schema.right_column(),
            schema.parent_column(),
        ];
        if let Some(scope) = schema.scope_column() {
            indexed.push(scope);
        }
        for column in indexed {
            let index = format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}({})",
                quote(&format!("idx_{}_{}", schema.table(), column)),
                table,
                quote(column)
            );
            conn.execute(&index, ()).await.map_err(|e| {
                StoreError::initialization_failed(format!(
                    "Failed to create index on {}.{}: {}",
                    schema.table(),
                    column,
                    e
                ))
            })?;
        }

        tracing::debug!("Ensured nested set table '{}'", schema.table());
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        self.begin_with("BEGIN IMMEDIATE").await
    }

    async fn begin_read(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        // Deferred: takes a read snapshot on first query, never the write lock
        self.begin_with("BEGIN").await
    }
}

impl TursoTreeStore {
    async fn begin_with(&self, statement: &str) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let conn = self.conn.clone().lock_owned().await;

        conn.execute(statement, ())
            .await
            .map_err(|e| StoreError::transaction_failed(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(TursoTransaction {
            conn: Some(conn),
        }))
    }
}

/// Open libsql transaction; holds the connection lock until it finishes
struct TursoTransaction {
    conn: Option<OwnedMutexGuard<Connection>>,
}

impl TursoTransaction {
    fn conn(&self) -> Result<&Connection, StoreError> {
        self.conn
            .as_deref()
            .ok_or_else(|| StoreError::transaction_failed("Transaction already finished"))
    }

    async fn query_nodes(
        &self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
        order: OrderBy,
        limit: Option<usize>,
    ) -> Result<Vec<TreeNode>, StoreError> {
        let mut sql = SqlBuilder::new(schema);
        let where_clause = sql.predicate(predicate);
        let direction = match order.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        let limit_clause = limit.map(|l| format!(" LIMIT {}", l)).unwrap_or_default();
        let statement = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} {}, {} {}{}",
            select_columns(schema),
            quote(schema.table()),
            where_clause,
            quote(schema.column(order.field)),
            direction,
            quote(schema.id_column()),
            direction,
            limit_clause
        );

        let mut rows = self
            .conn()?
            .query(&statement, sql.into_params())
            .await
            .map_err(|e| {
                StoreError::sql_execution(format!("Failed to query {}: {}", schema.table(), e))
            })?;

        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| {
                StoreError::sql_execution(format!("Failed to read {}: {}", schema.table(), e))
            })?
        {
            nodes.push(row_to_node(&row)?);
        }
        Ok(nodes)
    }
}

#[async_trait]
impl StoreTransaction for TursoTransaction {
    async fn find_one(
        &mut self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
        order: OrderBy,
    ) -> Result<Option<TreeNode>, StoreError> {
        Ok(self
            .query_nodes(schema, predicate, order, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn find_all(
        &mut self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
        order: OrderBy,
    ) -> Result<Vec<TreeNode>, StoreError> {
        self.query_nodes(schema, predicate, order, None).await
    }

    async fn insert_returning_id(
        &mut self,
        schema: &SchemaDescriptor,
        row: &NewTreeRow,
    ) -> Result<i64, StoreError> {
        let payload = serde_json::to_string(&row.payload)?;

        let mut columns = vec![
            quote(schema.left_column()),
            quote(schema.right_column()),
            quote(schema.parent_column()),
            quote(schema.depth_column()),
        ];
        let mut values = vec![
            Value::Integer(row.left),
            Value::Integer(row.right),
            row.parent_id.map(Value::Integer).unwrap_or(Value::Null),
            Value::Integer(row.depth),
        ];
        if let Some(scope_column) = schema.scope_column() {
            columns.push(quote(scope_column));
            values.push(row.scope.clone().map(Value::Text).unwrap_or(Value::Null));
        }
        columns.push(quote(schema.payload_column()));
        values.push(Value::Text(payload));

        let placeholders = vec!["?"; values.len()].join(", ");
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(schema.table()),
            columns.join(", "),
            placeholders
        );

        let conn = self.conn()?;
        conn.execute(&statement, Params::Positional(values))
            .await
            .map_err(|e| {
                StoreError::sql_execution(format!("Failed to insert into {}: {}", schema.table(), e))
            })?;

        Ok(conn.last_insert_rowid())
    }

    async fn update_all(
        &mut self,
        schema: &SchemaDescriptor,
        assignments: &[Assignment],
        predicate: &Predicate,
    ) -> Result<u64, StoreError> {
        if assignments.is_empty() {
            return Ok(0);
        }

        let mut sql = SqlBuilder::new(schema);
        let set_clause = sql.assignments(assignments);
        let where_clause = sql.predicate(predicate);
        let statement = format!(
            "UPDATE {} SET {} WHERE {}",
            quote(schema.table()),
            set_clause,
            where_clause
        );

        self.conn()?
            .execute(&statement, sql.into_params())
            .await
            .map_err(|e| {
                StoreError::sql_execution(format!("Failed to update {}: {}", schema.table(), e))
            })
    }

    async fn delete_all(
        &mut self,
        schema: &SchemaDescriptor,
        predicate: &Predicate,
    ) -> Result<u64, StoreError> {
        let mut sql = SqlBuilder::new(schema);
        let where_clause = sql.predicate(predicate);
        let statement = format!("DELETE FROM {} WHERE {}", quote(schema.table()), where_clause);

        self.conn()?
            .execute(&statement, sql.into_params())
            .await
            .map_err(|e| {
                StoreError::sql_execution(format!(
                    "Failed to delete from {}: {}",
                    schema.table(),
                    e
                ))
            })
    }

    async fn reload(
        &mut self,
        schema: &SchemaDescriptor,
        id: i64,
    ) -> Result<Option<TreeNode>, StoreError> {
        self.find_one(schema, &Predicate::id(id), OrderBy::default())
            .await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        let conn = this
            .conn
            .take()
            .ok_or_else(|| StoreError::transaction_failed("Transaction already finished"))?;

        if let Err(e) = conn.execute("COMMIT", ()).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(StoreError::transaction_failed(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        let conn = this
            .conn
            .take()
            .ok_or_else(|| StoreError::transaction_failed("Transaction already finished"))?;

        conn.execute("ROLLBACK", ())
            .await
            .map_err(|e| {
                StoreError::transaction_failed(format!("Failed to roll back transaction: {}", e))
            })?;
        Ok(())
    }
}

impl Drop for TursoTransaction {
    fn drop(&mut self) {
        // Abandoned without commit/rollback: roll back before releasing the lock
        if let Some(conn) = self.conn.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = conn.execute("ROLLBACK", ()).await {
                            tracing::warn!("Failed to roll back abandoned transaction: {}", e);
                        }
                    });
                }
                Err(_) => {
                    tracing::warn!("Abandoned transaction dropped outside a Tokio runtime");
                }
            }
        }
    }
}

/// Accumulates bound parameters while rendering SQL fragments
struct SqlBuilder<'a> {
    schema: &'a SchemaDescriptor,
    params: Vec<Value>,
}

impl<'a> SqlBuilder<'a> {
    fn new(schema: &'a SchemaDescriptor) -> Self {
        Self {
            schema,
            params: Vec::new(),
        }
    }

    fn column(&self, field: Field) -> String {
        quote(self.schema.column(field))
    }

    fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::All => "1 = 1".to_string(),
            Predicate::Compare(field, op, value) => {
                self.params.push(Value::Integer(*value));
                format!("{} {} ?", self.column(*field), op.as_sql())
            }
            Predicate::Scope(value) => match self.schema.scope_column() {
                None => "1 = 1".to_string(),
                Some(column) => match value {
                    Some(value) => {
                        self.params.push(Value::Text(value.clone()));
                        format!("{} = ?", quote(column))
                    }
                    None => format!("{} IS NULL", quote(column)),
                },
            },
            Predicate::And(parts) => {
                if parts.is_empty() {
                    return "1 = 1".to_string();
                }
                let rendered: Vec<String> = parts.iter().map(|p| self.predicate(p)).collect();
                format!("({})", rendered.join(" AND "))
            }
        }
    }

    fn assignments(&mut self, assignments: &[Assignment]) -> String {
        let mut rendered = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            match assignment {
                Assignment::Shift(field, delta) => {
                    self.params.push(Value::Integer(*delta));
                    let column = self.column(*field);
                    rendered.push(format!("{} = {} + ?", column, column));
                }
                Assignment::Set(field, Some(value)) => {
                    self.params.push(Value::Integer(*value));
                    rendered.push(format!("{} = ?", self.column(*field)));
                }
                Assignment::Set(field, None) => {
                    rendered.push(format!("{} = NULL", self.column(*field)));
                }
            }
        }
        rendered.join(", ")
    }

    fn into_params(self) -> Params {
        if self.params.is_empty() {
            Params::None
        } else {
            Params::Positional(self.params)
        }
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

/// Column list in the order `row_to_node` expects
fn select_columns(schema: &SchemaDescriptor) -> String {
    let scope = schema
        .scope_column()
        .map(quote)
        .unwrap_or_else(|| "NULL".to_string());
    format!(
        "{}, {}, {}, {}, {}, {}, {}",
        quote(schema.id_column()),
        quote(schema.left_column()),
        quote(schema.right_column()),
        quote(schema.parent_column()),
        quote(schema.depth_column()),
        scope,
        quote(schema.payload_column())
    )
}

/// Convert libsql::Row to TreeNode
///
/// # Row Format
///
/// - id (INTEGER)
/// - left (INTEGER)
/// - right (INTEGER)
/// - parent (INTEGER, nullable)
/// - depth (INTEGER)
/// - scope (TEXT, nullable)
/// - payload (TEXT, JSON)
fn row_to_node(row: &Row) -> Result<TreeNode, StoreError> {
    let id: i64 = row
        .get(0)
        .map_err(|e| StoreError::row_decode(format!("Failed to get id: {}", e)))?;
    let left: i64 = row
        .get(1)
        .map_err(|e| StoreError::row_decode(format!("Failed to get left bound: {}", e)))?;
    let right: i64 = row
        .get(2)
        .map_err(|e| StoreError::row_decode(format!("Failed to get right bound: {}", e)))?;
    let parent_id: Option<i64> = row
        .get(3)
        .map_err(|e| StoreError::row_decode(format!("Failed to get parent: {}", e)))?;
    let depth: i64 = row
        .get(4)
        .map_err(|e| StoreError::row_decode(format!("Failed to get depth: {}", e)))?;
    let scope: Option<String> = row
        .get(5)
        .map_err(|e| StoreError::row_decode(format!("Failed to get scope: {}", e)))?;
    let payload_json: Option<String> = row
        .get(6)
        .map_err(|e| StoreError::row_decode(format!("Failed to get payload: {}", e)))?;

    let payload = match payload_json {
        Some(json) if !json.is_empty() => serde_json::from_str(&json)?,
        _ => serde_json::Value::Null,
    };

    Ok(TreeNode {
        id,
        left,
        right,
        parent_id,
        depth,
        scope,
        payload,
    })
}
