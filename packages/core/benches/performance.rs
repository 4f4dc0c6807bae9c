//! Performance benchmarks for nested set operations
//!
//! Run with: `cargo bench -p nestedset-core`
//!
//! These benchmarks measure the range-shifting hot paths:
//! - Child insertion (gap opening across the whole forest)
//! - Sibling swap through the staging zone
//! - Sorting a shuffled child list

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nestedset_core::db::{TreeStore, TursoTreeStore};
use nestedset_core::models::{SchemaDescriptor, SortDirection, TreeNode};
use nestedset_core::services::NestedSetService;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// Setup a service with a fresh database
async fn setup_test_service() -> (NestedSetService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("bench.db");

    let store: Arc<dyn TreeStore> = Arc::new(TursoTreeStore::new(db_path).await.unwrap());
    let service = NestedSetService::new(store, Arc::new(SchemaDescriptor::default()));
    service.initialize().await.unwrap();
    (service, temp_dir)
}

/// Root with `count` children, each carrying one grandchild
async fn seed_children(service: &NestedSetService, count: usize) -> TreeNode {
    let root = service.insert_root(json!({"title": "root"})).await.unwrap();
    for i in 0..count {
        // Reverse-ordered keys so sorting has work to do
        let child = service
            .insert_child(json!({"title": format!("{:04}", count - i)}), root.id)
            .await
            .unwrap();
        service
            .insert_child(json!({"title": "leaf"}), child.id)
            .await
            .unwrap();
    }
    service.reload(&root).await.unwrap().unwrap()
}

/// Benchmark child insertion under one parent
fn bench_insert_child(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("insert_child", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_test_service().await;
                let parent = service.insert_root(json!({"title": "parent"})).await.unwrap();

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let _child = service
                        .insert_child(json!({"title": format!("child{}", i)}), parent.id)
                        .await
                        .unwrap();
                }
                start.elapsed()
            })
        });
    });
}

/// Benchmark swapping the first and last of 50 siblings
fn bench_swap_siblings(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("swap_first_and_last_of_50", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_test_service().await;
                let root = seed_children(&service, 50).await;
                let children = service.direct_children(&root).await.unwrap();
                let (first, last) = (&children[0], &children[children.len() - 1]);

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    black_box(service.swap_siblings(first, last).await.unwrap());
                }
                start.elapsed()
            })
        });
    });
}

/// Benchmark sorting 25 reverse-ordered children
fn bench_sort_children(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("sort_children");
    group.sample_size(10); // Fewer samples for expensive operations

    group.bench_function("25_children", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let mut total = std::time::Duration::ZERO;

                for _ in 0..iters {
                    let (service, _temp) = setup_test_service().await;
                    let root = seed_children(&service, 25).await;

                    let start = std::time::Instant::now();
                    let sorted = service
                        .sort_children(&root, "title", SortDirection::Ascending)
                        .await;
                    total += start.elapsed();

                    black_box(sorted.unwrap());
                }

                total
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_child,
    bench_swap_siblings,
    bench_sort_children
);
criterion_main!(benches);
