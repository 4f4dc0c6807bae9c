//! Query Service - Structural Queries over Interval Bounds
//!
//! Every query translates the node's bounds into a range predicate (see
//! [`range`]) and reads the matching rows of the service's forest inside one
//! snapshot. Queries never fail because nothing matched; absence is an empty
//! list or `None`.
//!
//! # Query Patterns
//!
//! - Ancestors: `L < node.L AND R > node.R`, nearest first
//! - Descendants: `L > node.L AND R < node.R`
//! - Previous sibling: `R = node.L - 1`
//! - Roots: `depth = 0`
//!
//! Queries use the bounds of the `TreeNode` they are given. After a mutation,
//! refresh stale handles with [`NestedSetService::reload`].

pub mod range;

use crate::db::StoreTransaction;
use crate::models::{Field, OrderBy, Predicate, TreeNode};
use crate::services::error::NestedSetError;
use crate::services::NestedSetService;

impl NestedSetService {
    /// Fetch a node by id (`None` if it doesn't exist in this forest)
    pub async fn find(&self, id: i64) -> Result<Option<TreeNode>, NestedSetError> {
        self.read_one(Predicate::id(id), OrderBy::default()).await
    }

    /// Re-read a node from the store
    pub async fn reload(&self, node: &TreeNode) -> Result<Option<TreeNode>, NestedSetError> {
        self.find(node.id).await
    }

    /// The node's parent, always fetched from the store
    pub async fn parent(&self, node: &TreeNode) -> Result<Option<TreeNode>, NestedSetError> {
        match node.parent_id {
            Some(parent_id) => self.find(parent_id).await,
            None => Ok(None),
        }
    }

    /// Every node of the forest in document order
    pub async fn all(&self) -> Result<Vec<TreeNode>, NestedSetError> {
        self.read_all(Predicate::All, OrderBy::default()).await
    }

    pub async fn roots(&self) -> Result<Vec<TreeNode>, NestedSetError> {
        self.read_all(range::roots(), OrderBy::default()).await
    }

    /// Largest right bound in the forest (0 when empty)
    pub async fn right_outer_bound(&self) -> Result<i64, NestedSetError> {
        Ok(self
            .read_one(Predicate::All, OrderBy::desc(Field::Right))
            .await?
            .map(|node| node.right)
            .unwrap_or(0))
    }

    /// Ancestors nearest-first (parent, grandparent, ..., root)
    pub async fn ancestors(&self, node: &TreeNode) -> Result<Vec<TreeNode>, NestedSetError> {
        self.read_all(range::ancestors(node), OrderBy::desc(Field::Left))
            .await
    }

    /// Descendants in document order, optionally restricted to one depth
    pub async fn children(
        &self,
        node: &TreeNode,
        exact_depth: Option<i64>,
    ) -> Result<Vec<TreeNode>, NestedSetError> {
        if node.is_leaf() {
            return Ok(Vec::new());
        }
        self.read_all(range::children(node, exact_depth), OrderBy::default())
            .await
    }

    pub async fn direct_children(&self, node: &TreeNode) -> Result<Vec<TreeNode>, NestedSetError> {
        self.children(node, Some(node.depth + 1)).await
    }

    pub async fn self_and_descendants(
        &self,
        node: &TreeNode,
    ) -> Result<Vec<TreeNode>, NestedSetError> {
        self.read_all(range::self_and_descendants(node), OrderBy::default())
            .await
    }

    /// Siblings to the left of `node`, in document order
    pub async fn previous_siblings(
        &self,
        node: &TreeNode,
    ) -> Result<Vec<TreeNode>, NestedSetError> {
        let mut tx = self.begin_read().await?;
        let result: Result<Vec<TreeNode>, NestedSetError> = async {
            let parent = self.sibling_bound(tx.as_mut(), node).await?;
            Ok(tx
                .find_all(
                    self.schema(),
                    &self.scoped(range::previous_siblings(node, parent.as_ref())),
                    OrderBy::default(),
                )
                .await?)
        }
        .await;
        self.finish(tx, result, "previous_siblings").await
    }

    /// Siblings to the right of `node`, in document order
    pub async fn next_siblings(&self, node: &TreeNode) -> Result<Vec<TreeNode>, NestedSetError> {
        let mut tx = self.begin_read().await?;
        let result: Result<Vec<TreeNode>, NestedSetError> = async {
            let parent = self.sibling_bound(tx.as_mut(), node).await?;
            Ok(tx
                .find_all(
                    self.schema(),
                    &self.scoped(range::next_siblings(node, parent.as_ref())),
                    OrderBy::default(),
                )
                .await?)
        }
        .await;
        self.finish(tx, result, "next_siblings").await
    }

    pub async fn previous_sibling(
        &self,
        node: &TreeNode,
    ) -> Result<Option<TreeNode>, NestedSetError> {
        self.read_one(range::previous_sibling(node), OrderBy::default())
            .await
    }

    pub async fn next_sibling(&self, node: &TreeNode) -> Result<Option<TreeNode>, NestedSetError> {
        self.read_one(range::next_sibling(node), OrderBy::default())
            .await
    }

    /// Parent bounding a sibling range; a vanished parent leaves it unbounded
    async fn sibling_bound(
        &self,
        tx: &mut dyn StoreTransaction,
        node: &TreeNode,
    ) -> Result<Option<TreeNode>, NestedSetError> {
        let Some(parent_id) = node.parent_id else {
            return Ok(None);
        };
        let parent = self.load(tx, parent_id).await?;
        if parent.is_none() {
            tracing::warn!(
                "Parent {} of node {} not found; sibling range left unbounded",
                parent_id,
                node.id
            );
        }
        Ok(parent)
    }
}

#[cfg(test)]
mod query_service_test;
