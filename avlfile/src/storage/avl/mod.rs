//! AVL tree engine.
//!
//! The engine is written purely against the `SlotStore` trait: slot indices
//! stand in for pointers, `read_slot` for dereferencing and `append_slot` for
//! allocation.
//!
//! # Usage
//!
//! ```
//! use avlfile::record::Sale;
//! use avlfile::storage::{AvlTree, MemorySlots};
//!
//! let mut slots = MemorySlots::<Sale>::new();
//! let mut tree = AvlTree::new(&mut slots);
//!
//! for id in [10, 5, 15, 2, 7] {
//!     tree.insert(Sale::new(id, "Producto", 1, 1.0, "2025-01-01")).unwrap();
//! }
//!
//! assert_eq!(tree.height().unwrap(), 3);
//! let ids: Vec<i32> = tree.range_search(3, 12).unwrap().iter().map(|s| s.id).collect();
//! assert_eq!(ids, vec![5, 7, 10]);
//! ```

mod tree;
mod verify;

pub use tree::{AvlError, AvlTree, KeyOf};
pub use verify::{TreeReport, Violation};
