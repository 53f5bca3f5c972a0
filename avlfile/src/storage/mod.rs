//! Disk-resident AVL index storage.
//!
//! The whole index lives in a single file of fixed-size slots.
//!
//! # File Format
//!
//! - Bytes 0-3: root slot index (`i32`, little-endian, `-1` = empty tree)
//! - Slot `i` at byte `4 + i * node_size`: the encoded record followed by
//!   `left`, `right` and `height` (`i32` each, little-endian, `-1` = no child)
//!
//! Slots are only ever appended. A deleted node's slot is left behind as
//! garbage and never reused.
//!
//! # Usage
//!
//! ```no_run
//! use avlfile::record::Sale;
//! use avlfile::storage::AvlIndex;
//!
//! # fn main() -> Result<(), avlfile::storage::AvlError> {
//! let mut index = AvlIndex::<Sale>::open("./sales_avl.dat")?;
//! index.insert(Sale::new(10, "Laptop", 2, 899.99, "2025-03-14"))?;
//!
//! if let Some(sale) = index.search(10)? {
//!     println!("{sale}");
//! }
//! # Ok(())
//! # }
//! ```

mod avl;
mod file;
mod index;
mod io;
mod memory;
mod node;
mod slot;

pub use avl::{AvlError, AvlTree, KeyOf, TreeReport, Violation};
pub use file::SlotFile;
pub use index::{AvlIndex, PersistenceMode};
pub use io::{SlotStore, StorageError};
pub use memory::{FaultConfig, MemorySlots, SlotStats};
pub use node::{LINK_FIELDS_SIZE, Node, NodeError};
pub use slot::{HEADER_SIZE, NIL, SlotIndex};
