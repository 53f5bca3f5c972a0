//! AVL tree over a slot store.
//!
//! Every child pointer is a slot index and every dereference is a
//! `read_slot`. Nothing is cached between public calls: the root is read from
//! the header at the start of each operation and nodes live only for the
//! duration of the recursion that loaded them.
//!
//! Every descent step requires the child's stored height to be below its
//! parent's, so a cyclic or otherwise malformed file ends in
//! `AvlError::Corrupted` instead of an endless walk.
//!
//! Writes are not transactional. A failure halfway through a rotation leaves
//! the slots that were already written as they are.

use std::cmp::Ordering;

use crate::record::Record;
use crate::storage::io::{SlotStore, StorageError};
use crate::storage::node::Node;
use crate::storage::slot::SlotIndex;

/// Key type of the records held by a store.
pub type KeyOf<S> = <<S as SlotStore>::Record as Record>::Key;

/// How to pick the rotation case when a node is out of balance.
#[derive(Clone, Copy)]
enum Rebalance<K> {
    /// After an insert: compare the new key with the heavy child's key.
    Inserted(K),
    /// After a delete: use the heavy child's balance factor.
    Removed,
}

/// An AVL tree backed by a slot store.
pub struct AvlTree<'a, S: SlotStore + ?Sized> {
    pub(super) store: &'a mut S,
}

impl<'a, S: SlotStore + ?Sized> AvlTree<'a, S> {
    /// Wrap a slot store. The tree shape is whatever the store's header says.
    pub const fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Current root slot.
    pub fn root(&mut self) -> Result<Option<SlotIndex>, AvlError> {
        Ok(self.store.read_header()?)
    }

    /// Height of the whole tree (0 when empty).
    pub fn height(&mut self) -> Result<i32, AvlError> {
        let root = self.root()?;
        self.height_of(root)
    }

    /// Look up a record by key.
    pub fn search(&mut self, key: KeyOf<S>) -> Result<Option<S::Record>, AvlError> {
        let mut link = self.root()?;
        let mut parent_height = None;

        while let Some(index) = link {
            let node = self.load_below(index, parent_height)?;
            parent_height = Some(node.height);
            link = match key.cmp(&node.payload.key()) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Ok(Some(node.payload)),
            };
        }

        Ok(None)
    }

    /// Insert a record.
    ///
    /// Returns `false` without touching the store if the key already exists.
    pub fn insert(&mut self, record: S::Record) -> Result<bool, AvlError> {
        let key = record.key();

        let Some(root) = self.root()? else {
            let index = self.store.append_slot(&Node::leaf(record))?;
            self.store.write_header(Some(index))?;
            tracing::debug!("inserted key {key} as root in slot {index}");
            return Ok(true);
        };

        let Some(new_root) = self.insert_at(root, None, record)? else {
            tracing::debug!("key {key} already present, insert ignored");
            return Ok(false);
        };

        if new_root != root {
            self.store.write_header(Some(new_root))?;
        }
        tracing::debug!("inserted key {key}");
        Ok(true)
    }

    /// Delete a record by key and return it.
    ///
    /// An absent key is not an error: the store is left untouched and `None`
    /// is returned. The removed node's slot is orphaned, never reused.
    pub fn delete(&mut self, key: KeyOf<S>) -> Result<Option<S::Record>, AvlError> {
        let Some(root) = self.root()? else {
            return Ok(None);
        };

        let Some((new_root, removed)) = self.delete_at(root, None, key)? else {
            return Ok(None);
        };

        if new_root != Some(root) {
            self.store.write_header(new_root)?;
        }
        tracing::debug!("deleted key {key}");
        Ok(Some(removed))
    }

    /// All records with `low <= key <= high`, in ascending key order.
    pub fn range_search(
        &mut self,
        low: KeyOf<S>,
        high: KeyOf<S>,
    ) -> Result<Vec<S::Record>, AvlError> {
        let mut out = Vec::new();
        if low <= high {
            let root = self.root()?;
            self.collect_range(root, None, low, high, &mut out)?;
        }
        Ok(out)
    }

    /// Every record in ascending key order.
    pub fn records(&mut self) -> Result<Vec<S::Record>, AvlError> {
        let mut out = Vec::new();
        let root = self.root()?;
        self.collect_all(root, None, &mut out)?;
        Ok(out)
    }

    /// Read a linked node. A link to a slot past the end of the store is an error.
    pub(super) fn load(&mut self, index: SlotIndex) -> Result<Node<S::Record>, AvlError> {
        self.store
            .read_slot(index)?
            .ok_or(AvlError::DanglingLink(index))
    }

    /// Read a node reached from a parent of height `parent_height` (`None` for
    /// the root). A child whose stored height is not below its parent's can
    /// only come from a cycle or a corrupted file.
    fn load_below(
        &mut self,
        index: SlotIndex,
        parent_height: Option<i32>,
    ) -> Result<Node<S::Record>, AvlError> {
        let node = self.load(index)?;
        if parent_height.is_some_and(|parent| node.height >= parent) {
            return Err(AvlError::Corrupted {
                index,
                reason: "child height not below parent",
            });
        }
        Ok(node)
    }

    fn height_of(&mut self, link: Option<SlotIndex>) -> Result<i32, AvlError> {
        match link {
            Some(index) => Ok(self.load(index)?.height),
            None => Ok(0),
        }
    }

    /// Stored heights of a node's (left, right) children.
    fn child_heights(&mut self, node: &Node<S::Record>) -> Result<(i32, i32), AvlError> {
        Ok((self.height_of(node.left)?, self.height_of(node.right)?))
    }

    fn balance_factor(&mut self, node: &Node<S::Record>) -> Result<i32, AvlError> {
        let (left, right) = self.child_heights(node)?;
        Ok(left - right)
    }

    /// Insert below `index`. Returns the new subtree root, or `None` for a duplicate.
    fn insert_at(
        &mut self,
        index: SlotIndex,
        parent_height: Option<i32>,
        record: S::Record,
    ) -> Result<Option<SlotIndex>, AvlError> {
        let mut node = self.load_below(index, parent_height)?;
        let bound = Some(node.height);
        let key = record.key();

        match key.cmp(&node.payload.key()) {
            Ordering::Less => {
                let child = match node.left {
                    Some(left) => match self.insert_at(left, bound, record)? {
                        Some(child) => child,
                        None => return Ok(None),
                    },
                    None => self.store.append_slot(&Node::leaf(record))?,
                };
                node.left = Some(child);
            }
            Ordering::Greater => {
                let child = match node.right {
                    Some(right) => match self.insert_at(right, bound, record)? {
                        Some(child) => child,
                        None => return Ok(None),
                    },
                    None => self.store.append_slot(&Node::leaf(record))?,
                };
                node.right = Some(child);
            }
            Ordering::Equal => return Ok(None),
        }

        self.rebalance(index, node, Rebalance::Inserted(key)).map(Some)
    }

    /// Delete `key` below `index`.
    ///
    /// Returns the new subtree root and the removed record, or `None` if the
    /// key is not in this subtree (in which case nothing was written).
    #[allow(clippy::type_complexity)]
    fn delete_at(
        &mut self,
        index: SlotIndex,
        parent_height: Option<i32>,
        key: KeyOf<S>,
    ) -> Result<Option<(Option<SlotIndex>, S::Record)>, AvlError> {
        let mut node = self.load_below(index, parent_height)?;
        let bound = Some(node.height);

        let removed = match key.cmp(&node.payload.key()) {
            Ordering::Less => {
                let Some(left) = node.left else {
                    return Ok(None);
                };
                let Some((child, removed)) = self.delete_at(left, bound, key)? else {
                    return Ok(None);
                };
                node.left = child;
                removed
            }
            Ordering::Greater => {
                let Some(right) = node.right else {
                    return Ok(None);
                };
                let Some((child, removed)) = self.delete_at(right, bound, key)? else {
                    return Ok(None);
                };
                node.right = child;
                removed
            }
            Ordering::Equal => match (node.left, node.right) {
                // Zero or one child: the parent links straight to the child.
                (None, child) | (child, None) => return Ok(Some((child, node.payload))),
                (Some(_), Some(right)) => {
                    let successor = self.min_record(right, bound)?;
                    let successor_key = successor.key();
                    let (child, _) = self.delete_at(right, bound, successor_key)?.ok_or(
                        AvlError::Corrupted {
                            index: right,
                            reason: "in-order successor vanished during delete",
                        },
                    )?;
                    node.right = child;
                    std::mem::replace(&mut node.payload, successor)
                }
            },
        };

        let new_root = self.rebalance(index, node, Rebalance::Removed)?;
        Ok(Some((Some(new_root), removed)))
    }

    /// Record with the smallest key in the subtree rooted at `index`.
    fn min_record(
        &mut self,
        index: SlotIndex,
        parent_height: Option<i32>,
    ) -> Result<S::Record, AvlError> {
        let mut node = self.load_below(index, parent_height)?;
        while let Some(left) = node.left {
            node = self.load_below(left, Some(node.height))?;
        }
        Ok(node.payload)
    }

    /// Recompute the height of `node` (stored at `index`), restore balance and
    /// write it back. Returns the slot that now roots this subtree.
    fn rebalance(
        &mut self,
        index: SlotIndex,
        mut node: Node<S::Record>,
        hint: Rebalance<KeyOf<S>>,
    ) -> Result<SlotIndex, AvlError> {
        let (left_height, right_height) = self.child_heights(&node)?;
        node.height = 1 + left_height.max(right_height);
        let balance = left_height - right_height;

        if balance > 1 {
            let left_index = node.left.ok_or(AvlError::Corrupted {
                index,
                reason: "left-heavy node has no left child",
            })?;
            let left = self.load(left_index)?;
            let left_right = match hint {
                Rebalance::Inserted(key) => key > left.payload.key(),
                Rebalance::Removed => self.balance_factor(&left)? < 0,
            };
            if left_right {
                node.left = Some(self.rotate_left(left_index, left)?);
            }
            return self.rotate_right(index, node);
        }

        if balance < -1 {
            let right_index = node.right.ok_or(AvlError::Corrupted {
                index,
                reason: "right-heavy node has no right child",
            })?;
            let right = self.load(right_index)?;
            let right_left = match hint {
                Rebalance::Inserted(key) => key < right.payload.key(),
                Rebalance::Removed => self.balance_factor(&right)? > 0,
            };
            if right_left {
                node.right = Some(self.rotate_right(right_index, right)?);
            }
            return self.rotate_left(index, node);
        }

        self.store.write_slot(index, &node)?;
        Ok(index)
    }

    /// Right rotation of `y` (at `y_index`) around its left child `x`.
    ///
    /// `x` becomes the subtree root, `x`'s right subtree becomes `y`'s left
    /// subtree and `y` becomes `x`'s right child. Heights are recomputed for
    /// `y` first, then `x`. Returns `x`'s slot.
    fn rotate_right(
        &mut self,
        y_index: SlotIndex,
        mut y: Node<S::Record>,
    ) -> Result<SlotIndex, AvlError> {
        let x_index = y.left.ok_or(AvlError::Corrupted {
            index: y_index,
            reason: "right rotation without a left child",
        })?;
        let mut x = self.load(x_index)?;

        y.left = x.right;
        let (left, right) = self.child_heights(&y)?;
        y.height = 1 + left.max(right);

        x.right = Some(y_index);
        x.height = 1 + self.height_of(x.left)?.max(y.height);

        self.store.write_slot(y_index, &y)?;
        self.store.write_slot(x_index, &x)?;
        tracing::trace!("rotated right: slot {x_index} replaces slot {y_index}");
        Ok(x_index)
    }

    /// Left rotation of `x` (at `x_index`) around its right child `y`.
    /// Mirror image of `rotate_right`. Returns `y`'s slot.
    fn rotate_left(
        &mut self,
        x_index: SlotIndex,
        mut x: Node<S::Record>,
    ) -> Result<SlotIndex, AvlError> {
        let y_index = x.right.ok_or(AvlError::Corrupted {
            index: x_index,
            reason: "left rotation without a right child",
        })?;
        let mut y = self.load(y_index)?;

        x.right = y.left;
        let (left, right) = self.child_heights(&x)?;
        x.height = 1 + left.max(right);

        y.left = Some(x_index);
        y.height = 1 + x.height.max(self.height_of(y.right)?);

        self.store.write_slot(x_index, &x)?;
        self.store.write_slot(y_index, &y)?;
        tracing::trace!("rotated left: slot {y_index} replaces slot {x_index}");
        Ok(y_index)
    }

    fn collect_range(
        &mut self,
        link: Option<SlotIndex>,
        parent_height: Option<i32>,
        low: KeyOf<S>,
        high: KeyOf<S>,
        out: &mut Vec<S::Record>,
    ) -> Result<(), AvlError> {
        let Some(index) = link else {
            return Ok(());
        };
        let node = self.load_below(index, parent_height)?;
        let bound = Some(node.height);
        let key = node.payload.key();

        if low < key {
            self.collect_range(node.left, bound, low, high, out)?;
        }
        let right = node.right;
        if low <= key && key <= high {
            out.push(node.payload);
        }
        if key < high {
            self.collect_range(right, bound, low, high, out)?;
        }
        Ok(())
    }

    fn collect_all(
        &mut self,
        link: Option<SlotIndex>,
        parent_height: Option<i32>,
        out: &mut Vec<S::Record>,
    ) -> Result<(), AvlError> {
        let Some(index) = link else {
            return Ok(());
        };
        let node = self.load_below(index, parent_height)?;
        let bound = Some(node.height);
        self.collect_all(node.left, bound, out)?;
        let right = node.right;
        out.push(node.payload);
        self.collect_all(right, bound, out)
    }
}

/// Errors that can occur during tree operations.
#[derive(Debug)]
pub enum AvlError {
    /// Slot store error.
    Storage(StorageError),
    /// A child link or the root points past the last slot.
    DanglingLink(SlotIndex),
    /// The stored shape contradicts the tree invariants.
    Corrupted {
        index: SlotIndex,
        reason: &'static str,
    },
}

impl std::fmt::Display for AvlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::DanglingLink(index) => write!(f, "link to missing slot {index}"),
            Self::Corrupted { index, reason } => {
                write!(f, "corrupted tree at slot {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for AvlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::DanglingLink(_) | Self::Corrupted { .. } => None,
        }
    }
}

impl From<StorageError> for AvlError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}
