//! Slot store abstraction.
//!
//! The tree engine only ever talks to a `SlotStore`. The production store is
//! the index file itself (`SlotFile`); `MemorySlots` holds the same byte
//! image in memory and backs the whole-file-rewrite mode and fault injection
//! in tests.
//!
//! # Contract
//!
//! Implementations must ensure:
//! - `read_slot` returns the last node written to that slot
//! - `read_slot` returns `Ok(None)` for a slot past the end of the store
//! - `write_slot` only overwrites existing slots, it never creates gaps
//! - `append_slot` returns indices in increasing order starting at 0
//! - nothing is rolled back when a later call fails

use crate::record::Record;
use crate::storage::node::{Node, NodeError};
use crate::storage::slot::SlotIndex;

/// Errors that can occur during slot store operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error.
    Io(std::io::Error),
    /// The store is shorter than the header.
    MissingHeader { len: u64 },
    /// Header holds a value that is neither -1 nor a slot index.
    CorruptHeader(i32),
    /// A slot could not be decoded.
    CorruptSlot { index: SlotIndex, source: NodeError },
    /// Write to a slot that was never appended.
    SlotOutOfBounds { index: SlotIndex, slot_count: u32 },
    /// Store length is not a whole number of slots.
    TornTail { len: u64 },
    /// No more slot indices can be represented on disk.
    SlotSpaceExhausted,
    /// Injected fault for simulation.
    InjectedFault(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::MissingHeader { len } => {
                write!(f, "missing header (store is {len} bytes)")
            }
            Self::CorruptHeader(raw) => write!(f, "corrupt header: root slot {raw}"),
            Self::CorruptSlot { index, source } => {
                write!(f, "corrupt slot {index}: {source}")
            }
            Self::SlotOutOfBounds { index, slot_count } => write!(
                f,
                "slot {index} out of bounds (slot count: {slot_count})"
            ),
            Self::TornTail { len } => {
                write!(f, "store length {len} is not a whole number of slots")
            }
            Self::SlotSpaceExhausted => write!(f, "slot space exhausted"),
            Self::InjectedFault(msg) => write!(f, "injected fault: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::CorruptSlot { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Abstraction over the header + slot array.
pub trait SlotStore {
    /// Payload type stored in each slot.
    type Record: Record;

    /// Read the root slot from the header.
    fn read_header(&mut self) -> Result<Option<SlotIndex>, StorageError>;

    /// Overwrite the header with a new root slot.
    fn write_header(&mut self, root: Option<SlotIndex>) -> Result<(), StorageError>;

    /// Read a slot. Returns `Ok(None)` if the slot lies past the end of the store.
    fn read_slot(&mut self, index: SlotIndex)
    -> Result<Option<Node<Self::Record>>, StorageError>;

    /// Overwrite an existing slot.
    fn write_slot(
        &mut self,
        index: SlotIndex,
        node: &Node<Self::Record>,
    ) -> Result<(), StorageError>;

    /// Append a node after the last slot and return its index.
    fn append_slot(&mut self, node: &Node<Self::Record>) -> Result<SlotIndex, StorageError>;

    /// Number of slots, including ones no longer reachable from the root.
    fn slot_count(&mut self) -> Result<u32, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let index = SlotIndex::new(10).expect("valid index");
        let e = StorageError::SlotOutOfBounds {
            index,
            slot_count: 5,
        };
        assert!(e.to_string().contains("slot 10"));
        assert!(e.to_string().contains("slot count: 5"));

        let e = StorageError::CorruptSlot {
            index,
            source: NodeError::InvalidHeight(0),
        };
        assert_eq!(e.to_string(), "corrupt slot 10: invalid height 0");
        assert!(std::error::Error::source(&e).is_some());

        let e = StorageError::InjectedFault("test fault".to_string());
        assert!(e.to_string().contains("test fault"));
    }
}
