//! Forest Inspector
//!
//! Opens a nested set database, prints the forest indented by depth in
//! document order, then prints the integrity report. With `--json` both are
//! printed as one JSON document instead. Exits with status 1 when any
//! invariant is violated.
//!
//! # Usage
//!
//! ```bash
//! # Inspect the default table of ./data/nestedset.db
//! cargo run --bin tree-inspect
//!
//! # Column bindings from a JSON config, one scoped forest
//! NESTEDSET_SCOPE=main cargo run --bin tree-inspect -- ./nestedset.json
//!
//! # Machine-readable output
//! cargo run --bin tree-inspect -- --json
//! ```
//!
//! # Environment
//!
//! - `NESTEDSET_DB` - database path (default `./data/nestedset.db`)
//! - `NESTEDSET_TABLE` - table name, overriding the config file
//! - `NESTEDSET_SCOPE` - scope value selecting one forest
//! - `RUST_LOG` - log filter (default `info`)

use anyhow::Context;
use nestedset_core::{
    db::{TreeStore, TursoTreeStore},
    services::NestedSetService,
    NestedSetConfig, TreeNode,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_PATH: &str = "./data/nestedset.db";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let as_json = args.iter().any(|arg| arg == "--json");
    let config_path = args.iter().find(|arg| !arg.starts_with("--"));

    let mut config = match config_path {
        Some(path) => NestedSetConfig::from_path(path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => NestedSetConfig::default(),
    };
    if let Ok(table) = std::env::var("NESTEDSET_TABLE") {
        config.table = table;
    }
    let schema = Arc::new(config.to_schema()?);

    let db_path = std::env::var("NESTEDSET_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH));
    tracing::info!("Inspecting table '{}' in {}", schema.table(), db_path.display());

    let store: Arc<dyn TreeStore> = Arc::new(TursoTreeStore::new(db_path).await?);
    let mut service = NestedSetService::new(store, schema);
    if let Ok(scope) = std::env::var("NESTEDSET_SCOPE") {
        service = service.with_scope(scope);
    }
    service.initialize().await?;

    let nodes = service.all().await?;
    let report = service.verify().await?;

    if as_json {
        let document = serde_json::json!({
            "table": service.schema().table(),
            "scope": service.scope(),
            "nodes": nodes,
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        if !report.is_valid() {
            std::process::exit(1);
        }
        return Ok(());
    }

    for node in &nodes {
        println!("{}", render_line(node));
    }

    println!();
    println!("{} nodes", report.node_count);
    if report.is_valid() {
        println!("✅ All nested set invariants hold");
        return Ok(());
    }

    println!("❌ {} violations:", report.violations.len());
    for violation in &report.violations {
        println!("   - {}", violation);
    }
    std::process::exit(1);
}

fn render_line(node: &TreeNode) -> String {
    let label = node
        .payload_field("title")
        .and_then(|title| title.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| node.payload.to_string());
    format!(
        "{}{} [{}, {}] #{}",
        "  ".repeat(node.depth.max(0) as usize),
        label,
        node.left,
        node.right,
        node.id
    )
}
