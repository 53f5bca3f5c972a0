//! Structural invariant checking.
//!
//! Walks every node reachable from the root and reports anything that breaks
//! the AVL invariants. Violations are collected, not returned as errors, so a
//! damaged file can still be inspected in full.

use std::collections::HashSet;

use crate::record::Record;
use crate::storage::avl::tree::{AvlError, AvlTree, KeyOf};
use crate::storage::io::SlotStore;
use crate::storage::slot::SlotIndex;

/// A single broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation<K> {
    /// Stored height differs from `1 + max(child heights)`.
    HeightMismatch {
        index: SlotIndex,
        stored: i32,
        actual: i32,
    },
    /// Balance factor outside `{-1, 0, 1}`.
    Unbalanced { index: SlotIndex, balance: i32 },
    /// Key not strictly between the bounds set by its ancestors.
    OutOfOrder { index: SlotIndex, key: K },
    /// Slot reached more than once (shared subtree or cycle).
    Revisited { index: SlotIndex },
}

/// Result of a full invariant walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeReport<K> {
    /// Nodes reachable from the root.
    pub reachable: usize,
    /// Slots in the store, reachable or not.
    pub slot_count: u32,
    /// Height recomputed from the actual shape.
    pub height: i32,
    pub violations: Vec<Violation<K>>,
}

impl<K> TreeReport<K> {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Slots left behind by deletes.
    #[must_use]
    pub fn orphaned(&self) -> usize {
        (self.slot_count as usize).saturating_sub(self.reachable)
    }
}

impl<S: SlotStore + ?Sized> AvlTree<'_, S> {
    /// Check every reachable node against the tree invariants.
    pub fn verify(&mut self) -> Result<TreeReport<KeyOf<S>>, AvlError> {
        let root = self.root()?;
        let slot_count = self.store.slot_count()?;

        let mut seen = HashSet::new();
        let mut violations = Vec::new();
        let height = self.check(root, None, None, &mut seen, &mut violations)?;

        if !violations.is_empty() {
            tracing::debug!("tree check found {} violations", violations.len());
        }

        Ok(TreeReport {
            reachable: seen.len(),
            slot_count,
            height,
            violations,
        })
    }

    /// Returns the height of the subtree as actually shaped.
    fn check(
        &mut self,
        link: Option<SlotIndex>,
        low: Option<KeyOf<S>>,
        high: Option<KeyOf<S>>,
        seen: &mut HashSet<SlotIndex>,
        violations: &mut Vec<Violation<KeyOf<S>>>,
    ) -> Result<i32, AvlError> {
        let Some(index) = link else {
            return Ok(0);
        };
        if !seen.insert(index) {
            violations.push(Violation::Revisited { index });
            return Ok(0);
        }

        let node = self.load(index)?;
        let key = node.payload.key();

        let above_low = low.is_none_or(|low| key > low);
        let below_high = high.is_none_or(|high| key < high);
        if !(above_low && below_high) {
            violations.push(Violation::OutOfOrder { index, key });
        }

        let left = self.check(node.left, low, Some(key), seen, violations)?;
        let right = self.check(node.right, Some(key), high, seen, violations)?;

        let actual = 1 + left.max(right);
        if node.height != actual {
            violations.push(Violation::HeightMismatch {
                index,
                stored: node.height,
                actual,
            });
        }
        let balance = left - right;
        if balance.abs() > 1 {
            violations.push(Violation::Unbalanced { index, balance });
        }

        Ok(actual)
    }
}
