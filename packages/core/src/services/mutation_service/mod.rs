//! Mutation Service - Structural Mutations over Interval Bounds
//!
//! Every mutation runs as one store transaction: the engine reads the
//! current bounds, computes shift deltas and issues the resulting range
//! updates, committing only when every step succeeded. A failure at any
//! point rolls the whole operation back.
//!
//! # Staging Zone
//!
//! Swaps and moves relocate whole subtrees. They first lift the subtree past
//! the largest right bound of the forest (`OUTER`), where no other row can
//! match a range predicate, then shift the rows left behind, then land the
//! staged block at its final position. Between steps the forest is
//! inconsistent, which is never visible outside the transaction.
//!
//! # Logging
//!
//! Node ids and computed deltas are logged at `debug`; rollbacks at `warn`.

use crate::db::{NewTreeRow, StoreTransaction};
use crate::models::{
    compare_payload_values, Assignment, Field, OrderBy, Predicate, SortDirection, TreeNode,
};
use crate::services::error::NestedSetError;
use crate::services::query_service::range;
use crate::services::NestedSetService;

impl NestedSetService {
    /// Append a new root after every existing root of the forest
    pub async fn insert_root(
        &self,
        payload: serde_json::Value,
    ) -> Result<TreeNode, NestedSetError> {
        let mut tx = self.begin().await?;
        let result = self.insert_root_in(tx.as_mut(), payload).await;
        self.finish(tx, result, "insert_root").await
    }

    /// Insert a node as the last child of `parent_id`
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if `parent_id` is not a persisted identity
    /// - `NodeNotFound` if the parent doesn't exist in this forest
    pub async fn insert_child(
        &self,
        payload: serde_json::Value,
        parent_id: i64,
    ) -> Result<TreeNode, NestedSetError> {
        if parent_id <= 0 {
            return Err(NestedSetError::invalid_operation(format!(
                "parent {} is not persisted",
                parent_id
            )));
        }
        let mut tx = self.begin().await?;
        let result = self.insert_child_in(tx.as_mut(), payload, parent_id).await;
        self.finish(tx, result, "insert_child").await
    }

    /// Insert a node as the last child of `parent`
    pub async fn add_child(
        &self,
        parent: &TreeNode,
        payload: serde_json::Value,
    ) -> Result<TreeNode, NestedSetError> {
        self.insert_child(payload, parent.id).await
    }

    /// Delete every descendant of `node`, keeping the node itself
    ///
    /// Returns the refreshed node, now a leaf.
    pub async fn delete_descendants(&self, node: &TreeNode) -> Result<TreeNode, NestedSetError> {
        ensure_persisted(node)?;
        let mut tx = self.begin().await?;
        let result = self.delete_descendants_in(tx.as_mut(), node.id).await;
        self.finish(tx, result, "delete_descendants").await
    }

    /// Remove `node` together with its subtree and close the gap it leaves
    ///
    /// Returns the number of rows removed.
    pub async fn remove(&self, node: &TreeNode) -> Result<u64, NestedSetError> {
        ensure_persisted(node)?;
        let mut tx = self.begin().await?;
        let result = self.remove_in(tx.as_mut(), node.id).await;
        self.finish(tx, result, "remove").await
    }

    /// Exchange the sibling positions of `a` and `b`, subtrees included
    ///
    /// Returns both nodes refreshed, in argument order. Swapping a node with
    /// itself changes nothing.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if either node is not persisted
    /// - `NotSiblings` if the nodes have different parents
    pub async fn swap_siblings(
        &self,
        a: &TreeNode,
        b: &TreeNode,
    ) -> Result<(TreeNode, TreeNode), NestedSetError> {
        ensure_persisted(a)?;
        ensure_persisted(b)?;
        let mut tx = self.begin().await?;
        let result = self.swap_in(tx.as_mut(), a.id, b.id).await;
        self.finish(tx, result, "swap_siblings").await
    }

    /// Swap `node` with its previous sibling
    ///
    /// Returns `None` (and changes nothing) if the node is already first.
    pub async fn move_up(&self, node: &TreeNode) -> Result<Option<TreeNode>, NestedSetError> {
        ensure_persisted(node)?;
        let mut tx = self.begin().await?;
        let result = self.move_beside_in(tx.as_mut(), node.id, Side::Previous).await;
        self.finish(tx, result, "move_up").await
    }

    /// Swap `node` with its next sibling
    ///
    /// Returns `None` (and changes nothing) if the node is already last.
    pub async fn move_down(&self, node: &TreeNode) -> Result<Option<TreeNode>, NestedSetError> {
        ensure_persisted(node)?;
        let mut tx = self.begin().await?;
        let result = self.move_beside_in(tx.as_mut(), node.id, Side::Next).await;
        self.finish(tx, result, "move_down").await
    }

    /// Reorder the direct children of `parent` by a payload key
    ///
    /// The sort is stable in both directions: children with equal keys keep
    /// their relative order. Returns the children in their new order.
    ///
    /// # Errors
    ///
    /// - `UnsupportedKey` if any child payload lacks `key`
    /// - `NodeNotFound` if the parent doesn't exist in this forest
    pub async fn sort_children(
        &self,
        parent: &TreeNode,
        key: &str,
        direction: SortDirection,
    ) -> Result<Vec<TreeNode>, NestedSetError> {
        ensure_persisted(parent)?;
        let mut tx = self.begin().await?;
        let result = self
            .sort_children_in(tx.as_mut(), parent.id, key, direction)
            .await;
        self.finish(tx, result, "sort_children").await
    }

    /// Move `node` and its subtree to become the last child of `new_parent`,
    /// or the last root when `new_parent` is `None`
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the node is not persisted, or the new parent
    ///   is the node itself or one of its descendants
    /// - `NodeNotFound` if the node or the new parent doesn't exist
    pub async fn move_to(
        &self,
        node: &TreeNode,
        new_parent: Option<i64>,
    ) -> Result<TreeNode, NestedSetError> {
        ensure_persisted(node)?;
        if new_parent == Some(node.id) {
            return Err(NestedSetError::invalid_operation(format!(
                "node {} cannot become its own parent",
                node.id
            )));
        }
        let mut tx = self.begin().await?;
        let result = self.move_to_in(tx.as_mut(), node.id, new_parent).await;
        self.finish(tx, result, "move_to").await
    }

    async fn insert_root_in(
        &self,
        tx: &mut dyn StoreTransaction,
        payload: serde_json::Value,
    ) -> Result<TreeNode, NestedSetError> {
        let left = self.max_right_in(tx, Predicate::All).await? + 1;
        let id = tx
            .insert_returning_id(
                self.schema(),
                &NewTreeRow {
                    left,
                    right: left + 1,
                    parent_id: None,
                    depth: 0,
                    scope: self.scope().map(str::to_string),
                    payload,
                },
            )
            .await?;

        tracing::debug!("Inserted root {} at ({}, {})", id, left, left + 1);
        self.load_existing(tx, id).await
    }

    async fn insert_child_in(
        &self,
        tx: &mut dyn StoreTransaction,
        payload: serde_json::Value,
        parent_id: i64,
    ) -> Result<TreeNode, NestedSetError> {
        let parent = self.load_existing(tx, parent_id).await?;

        // Phase 1: provisional end-of-forest placement to obtain an identity
        let provisional = self.max_right_in(tx, Predicate::All).await? + 1;
        let id = tx
            .insert_returning_id(
                self.schema(),
                &NewTreeRow {
                    left: provisional,
                    right: provisional + 1,
                    parent_id: Some(parent.id),
                    depth: parent.depth + 1,
                    scope: self.scope().map(str::to_string),
                    payload,
                },
            )
            .await?;

        // Phase 2: open a gap at the parent's right bound and move in
        self.open_gap_in(tx, parent.right, 2, None).await?;
        tx.update_all(
            self.schema(),
            &[
                Assignment::Set(Field::Left, Some(parent.right)),
                Assignment::Set(Field::Right, Some(parent.right + 1)),
            ],
            &Predicate::id(id),
        )
        .await?;

        tracing::debug!(
            "Inserted node {} under {} at ({}, {})",
            id,
            parent.id,
            parent.right,
            parent.right + 1
        );
        self.load_existing(tx, id).await
    }

    /// Delete everything strictly inside `node` and close the vacated gap
    async fn delete_subtree_in(
        &self,
        tx: &mut dyn StoreTransaction,
        node: &TreeNode,
    ) -> Result<u64, NestedSetError> {
        let descendants = node.children_count();
        if descendants == 0 {
            return Ok(0);
        }

        let deleted = tx
            .delete_all(
                self.schema(),
                &self.scoped(range::children(node, None)),
            )
            .await?;
        self.close_gap_in(tx, node.right, 2 * descendants).await?;

        tracing::debug!(
            "Deleted {} descendants of node {}, shifted bounds >= {} by -{}",
            deleted,
            node.id,
            node.right,
            2 * descendants
        );
        Ok(deleted)
    }

    async fn delete_descendants_in(
        &self,
        tx: &mut dyn StoreTransaction,
        id: i64,
    ) -> Result<TreeNode, NestedSetError> {
        let node = self.load_existing(tx, id).await?;
        self.delete_subtree_in(tx, &node).await?;
        self.load_existing(tx, id).await
    }

    async fn remove_in(
        &self,
        tx: &mut dyn StoreTransaction,
        id: i64,
    ) -> Result<u64, NestedSetError> {
        let node = self.load_existing(tx, id).await?;
        let descendants = self.delete_subtree_in(tx, &node).await?;

        // The subtree delete shrank the node to a leaf
        let node = self.load_existing(tx, id).await?;
        tx.delete_all(self.schema(), &Predicate::id(id)).await?;
        self.close_gap_in(tx, node.right, 2).await?;

        tracing::debug!("Removed node {} and {} descendants", id, descendants);
        Ok(descendants + 1)
    }

    async fn swap_in(
        &self,
        tx: &mut dyn StoreTransaction,
        a_id: i64,
        b_id: i64,
    ) -> Result<(TreeNode, TreeNode), NestedSetError> {
        let a = self.load_existing(tx, a_id).await?;
        let b = self.load_existing(tx, b_id).await?;

        if a.id == b.id {
            return Ok((a, b));
        }
        if a.parent_id != b.parent_id {
            return Err(NestedSetError::not_siblings(a.id, b.id));
        }

        let (first, second) = if a.left < b.left { (&a, &b) } else { (&b, &a) };
        let outer = self.max_right_in(tx, Predicate::All).await? + 1;
        let first_width = first.width();
        let second_width = second.width();
        let middle_width = second.left - first.right - 1;

        tracing::debug!(
            "Swapping nodes {} ({}, {}) and {} ({}, {}) via staging zone at {}",
            first.id,
            first.left,
            first.right,
            second.id,
            second.left,
            second.right,
            outer
        );

        // Lift both blocks into the staging zone, first block below the second
        self.shift_in(
            tx,
            range::self_and_descendants(first),
            outer - first.left,
        )
        .await?;
        self.shift_in(
            tx,
            range::self_and_descendants(second),
            outer + first_width - second.left,
        )
        .await?;

        // Everything between the two blocks moves by the difference in width
        if middle_width > 0 && first_width != second_width {
            self.shift_in(
                tx,
                Predicate::gt(Field::Left, first.right)
                    .and(Predicate::lt(Field::Right, second.left)),
                second_width - first_width,
            )
            .await?;
        }

        // Land the second block at the first slot, then the first block
        // right after the shifted middle
        self.shift_in(
            tx,
            Predicate::ge(Field::Left, outer + first_width),
            first.left - (outer + first_width),
        )
        .await?;
        self.shift_in(
            tx,
            Predicate::ge(Field::Left, outer),
            first.left + second_width + middle_width - outer,
        )
        .await?;

        let a = self.load_existing(tx, a_id).await?;
        let b = self.load_existing(tx, b_id).await?;
        Ok((a, b))
    }

    async fn move_beside_in(
        &self,
        tx: &mut dyn StoreTransaction,
        id: i64,
        side: Side,
    ) -> Result<Option<TreeNode>, NestedSetError> {
        let node = self.load_existing(tx, id).await?;
        let neighbour_predicate = match side {
            Side::Previous => range::previous_sibling(&node),
            Side::Next => range::next_sibling(&node),
        };
        let neighbour = tx
            .find_one(
                self.schema(),
                &self.scoped(neighbour_predicate),
                OrderBy::default(),
            )
            .await?;

        match neighbour {
            Some(neighbour) => {
                let (moved, _) = self.swap_in(tx, node.id, neighbour.id).await?;
                Ok(Some(moved))
            }
            None => Ok(None),
        }
    }

    async fn sort_children_in(
        &self,
        tx: &mut dyn StoreTransaction,
        parent_id: i64,
        key: &str,
        direction: SortDirection,
    ) -> Result<Vec<TreeNode>, NestedSetError> {
        // Swaps between children never move the parent's bounds
        let parent = self.load_existing(tx, parent_id).await?;
        let children = self.direct_children_in(tx, &parent).await?;

        if children.iter().any(|child| child.payload_field(key).is_none()) {
            return Err(NestedSetError::unsupported_key(key));
        }

        let mut target = children.clone();
        target.sort_by(|a, b| {
            let (a_key, b_key) = (a.payload_field(key), b.payload_field(key));
            let ordering = compare_payload_values(
                a_key.unwrap_or(&serde_json::Value::Null),
                b_key.unwrap_or(&serde_json::Value::Null),
            );
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });

        let mut swaps = 0;
        for (position, wanted) in target.iter().enumerate() {
            let current = self.direct_children_in(tx, &parent).await?;
            let Some(occupant) = current.get(position) else {
                break;
            };
            if occupant.id != wanted.id {
                self.swap_in(tx, occupant.id, wanted.id).await?;
                swaps += 1;
            }
        }

        tracing::debug!(
            "Sorted {} children of node {} by '{}' with {} swaps",
            target.len(),
            parent.id,
            key,
            swaps
        );
        self.direct_children_in(tx, &parent).await
    }

    async fn move_to_in(
        &self,
        tx: &mut dyn StoreTransaction,
        id: i64,
        new_parent: Option<i64>,
    ) -> Result<TreeNode, NestedSetError> {
        let node = self.load_existing(tx, id).await?;

        let new_depth = match new_parent {
            Some(parent_id) => {
                let parent = self.load_existing(tx, parent_id).await?;
                if node.contains(&parent) {
                    return Err(NestedSetError::invalid_operation(format!(
                        "cannot move node {} into its own subtree (node {})",
                        node.id, parent.id
                    )));
                }
                parent.depth + 1
            }
            None => 0,
        };

        let outer = self.max_right_in(tx, Predicate::All).await? + 1;
        let width = node.width();

        // Stage the subtree, fixing depths and the parent reference on the way
        tx.update_all(
            self.schema(),
            &[
                Assignment::Shift(Field::Left, outer - node.left),
                Assignment::Shift(Field::Right, outer - node.left),
                Assignment::Shift(Field::Depth, new_depth - node.depth),
            ],
            &self.scoped(range::self_and_descendants(&node)),
        )
        .await?;
        tx.update_all(
            self.schema(),
            &[Assignment::Set(Field::Parent, new_parent)],
            &Predicate::id(node.id),
        )
        .await?;

        // Close the vacated gap, then open one at the target
        self.close_gap_below_in(tx, node.right + 1, width, outer)
            .await?;
        let target = match new_parent {
            Some(parent_id) => self.load_existing(tx, parent_id).await?.right,
            None => self.max_right_in(tx, Predicate::lt(Field::Right, outer)).await? + 1,
        };
        self.open_gap_in(tx, target, width, Some(outer)).await?;

        self.shift_in(tx, Predicate::ge(Field::Left, outer), target - outer)
            .await?;

        tracing::debug!(
            "Moved node {} ({} rows) under {:?} at left bound {}",
            node.id,
            width / 2,
            new_parent,
            target
        );
        self.load_existing(tx, id).await
    }

    async fn direct_children_in(
        &self,
        tx: &mut dyn StoreTransaction,
        parent: &TreeNode,
    ) -> Result<Vec<TreeNode>, NestedSetError> {
        Ok(tx
            .find_all(
                self.schema(),
                &self.scoped(range::direct_children(parent)),
                OrderBy::default(),
            )
            .await?)
    }

    /// Largest right bound among rows matching `predicate` (0 when none)
    async fn max_right_in(
        &self,
        tx: &mut dyn StoreTransaction,
        predicate: Predicate,
    ) -> Result<i64, NestedSetError> {
        Ok(tx
            .find_one(
                self.schema(),
                &self.scoped(predicate),
                OrderBy::desc(Field::Right),
            )
            .await?
            .map(|node| node.right)
            .unwrap_or(0))
    }

    /// Shift both bounds of every matching row by `delta`
    async fn shift_in(
        &self,
        tx: &mut dyn StoreTransaction,
        predicate: Predicate,
        delta: i64,
    ) -> Result<u64, NestedSetError> {
        Ok(tx
            .update_all(
                self.schema(),
                &Assignment::shift_bounds(delta),
                &self.scoped(predicate),
            )
            .await?)
    }

    /// Shift every bound `>= from` (and `< limit`, if given) up by `width`
    async fn open_gap_in(
        &self,
        tx: &mut dyn StoreTransaction,
        from: i64,
        width: i64,
        limit: Option<i64>,
    ) -> Result<(), NestedSetError> {
        for field in [Field::Left, Field::Right] {
            let mut predicate = Predicate::ge(field, from);
            if let Some(limit) = limit {
                predicate = predicate.and(Predicate::lt(field, limit));
            }
            tx.update_all(
                self.schema(),
                &[Assignment::Shift(field, width)],
                &self.scoped(predicate),
            )
            .await?;
        }
        Ok(())
    }

    /// Shift every bound `>= from` down by `width`
    async fn close_gap_in(
        &self,
        tx: &mut dyn StoreTransaction,
        from: i64,
        width: i64,
    ) -> Result<(), NestedSetError> {
        for field in [Field::Left, Field::Right] {
            tx.update_all(
                self.schema(),
                &[Assignment::Shift(field, -width)],
                &self.scoped(Predicate::ge(field, from)),
            )
            .await?;
        }
        Ok(())
    }

    /// Shift every bound in `[from, limit)` down by `width`
    async fn close_gap_below_in(
        &self,
        tx: &mut dyn StoreTransaction,
        from: i64,
        width: i64,
        limit: i64,
    ) -> Result<(), NestedSetError> {
        for field in [Field::Left, Field::Right] {
            tx.update_all(
                self.schema(),
                &[Assignment::Shift(field, -width)],
                &self.scoped(Predicate::between(field, from, limit - 1)),
            )
            .await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Previous,
    Next,
}

fn ensure_persisted(node: &TreeNode) -> Result<(), NestedSetError> {
    if node.is_persisted() {
        Ok(())
    } else {
        Err(NestedSetError::invalid_operation(format!(
            "node {} is not persisted",
            node.id
        )))
    }
}
