//! Integration Tests for Structural Queries
//!
//! These tests build small forests through the mutation operations against a
//! real libsql database and check every range query's results and ordering.

#[cfg(test)]
mod tests {
    use crate::db::{TreeStore, TursoTreeStore};
    use crate::models::{SchemaDescriptor, TreeNode};
    use crate::services::NestedSetService;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Helper to create a service with a libsql database
    async fn create_test_service() -> (NestedSetService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let store: Arc<dyn TreeStore> = Arc::new(TursoTreeStore::new(db_path).await.unwrap());
        let service = NestedSetService::new(store, Arc::new(SchemaDescriptor::default()));
        service.initialize().await.unwrap();

        (service, temp_dir)
    }

    fn titles(nodes: &[TreeNode]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| n.payload["title"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// root > [a > [a1, a2], b, c > [c1]]
    async fn build_tree(service: &NestedSetService) -> TreeNode {
        let root = service.insert_root(json!({"title": "root"})).await.unwrap();
        let a = service.insert_child(json!({"title": "a"}), root.id).await.unwrap();
        service.insert_child(json!({"title": "a1"}), a.id).await.unwrap();
        service.insert_child(json!({"title": "a2"}), a.id).await.unwrap();
        service.insert_child(json!({"title": "b"}), root.id).await.unwrap();
        let c = service.insert_child(json!({"title": "c"}), root.id).await.unwrap();
        service.insert_child(json!({"title": "c1"}), c.id).await.unwrap();
        service.reload(&root).await.unwrap().unwrap()
    }

    async fn by_title(service: &NestedSetService, title: &str) -> TreeNode {
        service
            .all()
            .await
            .unwrap()
            .into_iter()
            .find(|n| n.payload["title"] == title)
            .unwrap()
    }

    #[tokio::test]
    async fn test_all_in_document_order() {
        let (service, _temp) = create_test_service().await;
        let root = build_tree(&service).await;

        assert_eq!((root.left, root.right), (1, 14));
        assert_eq!(
            titles(&service.all().await.unwrap()),
            vec!["root", "a", "a1", "a2", "b", "c", "c1"]
        );
        assert_eq!(service.right_outer_bound().await.unwrap(), 14);
    }

    #[tokio::test]
    async fn test_ancestors_nearest_first() {
        let (service, _temp) = create_test_service().await;
        build_tree(&service).await;

        let a2 = by_title(&service, "a2").await;
        let ancestors = service.ancestors(&a2).await.unwrap();

        assert_eq!(titles(&ancestors), vec!["a", "root"]);
        assert_eq!(ancestors.len() as i64, a2.depth);
    }

    #[tokio::test]
    async fn test_children_and_descendants() {
        let (service, _temp) = create_test_service().await;
        let root = build_tree(&service).await;

        assert_eq!(
            titles(&service.children(&root, None).await.unwrap()),
            vec!["a", "a1", "a2", "b", "c", "c1"]
        );
        assert_eq!(
            titles(&service.direct_children(&root).await.unwrap()),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            titles(&service.children(&root, Some(2)).await.unwrap()),
            vec!["a1", "a2", "c1"]
        );

        let a = by_title(&service, "a").await;
        assert_eq!(
            titles(&service.self_and_descendants(&a).await.unwrap()),
            vec!["a", "a1", "a2"]
        );

        let b = by_title(&service, "b").await;
        assert!(service.children(&b, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sibling_queries() {
        let (service, _temp) = create_test_service().await;
        build_tree(&service).await;

        let a = by_title(&service, "a").await;
        let b = by_title(&service, "b").await;
        let c = by_title(&service, "c").await;

        assert_eq!(titles(&service.previous_siblings(&c).await.unwrap()), vec!["a", "b"]);
        assert_eq!(titles(&service.next_siblings(&a).await.unwrap()), vec!["b", "c"]);
        assert!(service.previous_siblings(&a).await.unwrap().is_empty());
        assert!(service.next_siblings(&c).await.unwrap().is_empty());

        assert_eq!(service.previous_sibling(&b).await.unwrap().unwrap().id, a.id);
        assert_eq!(service.next_sibling(&b).await.unwrap().unwrap().id, c.id);
        assert!(service.previous_sibling(&a).await.unwrap().is_none());
        assert!(service.next_sibling(&c).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_siblings_do_not_leak_across_parents() {
        let (service, _temp) = create_test_service().await;
        build_tree(&service).await;

        // c1 is the only child of c; a1/a2 sit at the same depth under a
        let c1 = by_title(&service, "c1").await;
        assert!(service.previous_siblings(&c1).await.unwrap().is_empty());
        assert!(service.next_siblings(&c1).await.unwrap().is_empty());

        let a1 = by_title(&service, "a1").await;
        assert_eq!(titles(&service.next_siblings(&a1).await.unwrap()), vec!["a2"]);
    }

    #[tokio::test]
    async fn test_roots_and_parent() {
        let (service, _temp) = create_test_service().await;
        build_tree(&service).await;
        service.insert_root(json!({"title": "second"})).await.unwrap();

        let roots = service.roots().await.unwrap();
        assert_eq!(titles(&roots), vec!["root", "second"]);
        assert_eq!(service.previous_siblings(&roots[1]).await.unwrap().len(), 1);

        let a1 = by_title(&service, "a1").await;
        let parent = service.parent(&a1).await.unwrap().unwrap();
        assert_eq!(parent.payload["title"], "a");
        assert!(service.parent(&roots[0]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_results_are_not_errors() {
        let (service, _temp) = create_test_service().await;

        assert!(service.all().await.unwrap().is_empty());
        assert!(service.roots().await.unwrap().is_empty());
        assert!(service.find(42).await.unwrap().is_none());
        assert_eq!(service.right_outer_bound().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_parent_leaves_sibling_range_unbounded() {
        let (service, _temp) = create_test_service().await;
        let root = service.insert_root(json!({"title": "root"})).await.unwrap();
        let a = service.insert_child(json!({"title": "a"}), root.id).await.unwrap();
        let b = service.insert_child(json!({"title": "b"}), root.id).await.unwrap();

        let mut orphan = b.clone();
        orphan.parent_id = Some(9_999);
        let previous = service.previous_siblings(&orphan).await.unwrap();

        assert_eq!(previous.iter().map(|n| n.id).collect::<Vec<_>>(), vec![a.id]);
    }
}
