//! In-memory slot store.
//!
//! `MemorySlots` keeps the exact byte image of an index file in a `Vec<u8>`.
//! It is used in two places:
//! - the whole-file-rewrite persistence mode, which loads the file, runs one
//!   operation against the image and writes it back in a single write
//! - tests, which use its seeded fault injection and I/O counters

use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::record::Record;
use crate::storage::io::{SlotStore, StorageError};
use crate::storage::node::Node;
use crate::storage::slot::{
    HEADER_SIZE, HEADER_SIZE_U64, SlotIndex, decode_link, encode_link, slot_count,
};

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability of a slot read error (0.0 - 1.0).
    pub read_error_rate: f64,
    /// Probability of a write error on any mutation (0.0 - 1.0).
    pub write_error_rate: f64,
    /// Fail every mutation once this many have succeeded.
    pub fail_writes_after: Option<u64>,
}

impl FaultConfig {
    /// Create a fault config with no faults.
    #[must_use]
    pub fn no_faults() -> Self {
        Self::default()
    }

    /// Let `count` mutations succeed, then fail all the rest.
    #[must_use]
    pub fn writes_fail_after(count: u64) -> Self {
        Self {
            fail_writes_after: Some(count),
            ..Self::default()
        }
    }
}

/// Statistics about slot store operations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SlotStats {
    /// Number of slot reads.
    pub reads: u64,
    /// Number of slot overwrites.
    pub writes: u64,
    /// Number of appended slots.
    pub appends: u64,
    /// Number of header writes.
    pub header_writes: u64,
    /// Number of injected faults.
    pub injected_faults: u64,
}

impl SlotStats {
    /// Mutations of any kind.
    #[must_use]
    pub const fn mutations(&self) -> u64 {
        self.writes + self.appends + self.header_writes
    }
}

/// A slot store holding the whole file image in memory.
pub struct MemorySlots<R> {
    image: Vec<u8>,
    dirty: bool,
    faults: FaultConfig,
    rng: StdRng,
    stats: SlotStats,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> MemorySlots<R> {
    /// Create an empty tree image.
    #[must_use]
    pub fn new() -> Self {
        Self::with_faults(0, FaultConfig::no_faults())
    }

    /// Create an empty tree image with fault injection.
    ///
    /// The seed makes the sequence of injected faults reproducible.
    #[must_use]
    pub fn with_faults(seed: u64, faults: FaultConfig) -> Self {
        Self {
            image: encode_link(None).to_le_bytes().to_vec(),
            dirty: false,
            faults,
            rng: StdRng::seed_from_u64(seed),
            stats: SlotStats::default(),
            _record: PhantomData,
        }
    }

    /// Wrap an existing file image.
    pub fn from_image(image: Vec<u8>) -> Result<Self, StorageError> {
        if image.len() < HEADER_SIZE {
            return Err(StorageError::MissingHeader {
                len: image.len() as u64,
            });
        }
        let mut slots = Self::new();
        slots.image = image;
        Ok(slots)
    }

    /// The current byte image, laid out exactly like the index file.
    #[must_use]
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Whether any mutation succeeded since creation.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Get the current statistics.
    #[must_use]
    pub const fn stats(&self) -> &SlotStats {
        &self.stats
    }

    /// Reset statistics.
    pub fn reset_stats(&mut self) {
        self.stats = SlotStats::default();
    }

    /// Update the fault configuration.
    pub fn set_faults(&mut self, faults: FaultConfig) {
        self.faults = faults;
    }

    fn should_inject(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.random::<f64>() < rate
    }

    fn check_read(&mut self) -> Result<(), StorageError> {
        if self.should_inject(self.faults.read_error_rate) {
            self.stats.injected_faults += 1;
            return Err(StorageError::InjectedFault("slot read".to_string()));
        }
        Ok(())
    }

    fn check_write(&mut self, what: &str) -> Result<(), StorageError> {
        let exhausted = self
            .faults
            .fail_writes_after
            .is_some_and(|limit| self.stats.mutations() >= limit);
        if exhausted || self.should_inject(self.faults.write_error_rate) {
            self.stats.injected_faults += 1;
            return Err(StorageError::InjectedFault(what.to_string()));
        }
        Ok(())
    }

    fn len(&self) -> u64 {
        self.image.len() as u64
    }
}

impl<R: Record> Default for MemorySlots<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation)] // offsets are bounded by image.len()
impl<R: Record> SlotStore for MemorySlots<R> {
    type Record = R;

    fn read_header(&mut self) -> Result<Option<SlotIndex>, StorageError> {
        let header: [u8; HEADER_SIZE] = self
            .image
            .get(..HEADER_SIZE)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(StorageError::MissingHeader { len: self.len() })?;
        decode_link(i32::from_le_bytes(header)).map_err(StorageError::CorruptHeader)
    }

    fn write_header(&mut self, root: Option<SlotIndex>) -> Result<(), StorageError> {
        self.check_write("header write")?;
        if self.image.len() < HEADER_SIZE {
            return Err(StorageError::MissingHeader { len: self.len() });
        }
        self.image[..HEADER_SIZE].copy_from_slice(&encode_link(root).to_le_bytes());
        self.stats.header_writes += 1;
        self.dirty = true;
        Ok(())
    }

    fn read_slot(&mut self, index: SlotIndex) -> Result<Option<Node<R>>, StorageError> {
        self.check_read()?;
        self.stats.reads += 1;

        let start = index.byte_offset(Node::<R>::SIZE);
        let end = start + Node::<R>::SIZE as u64;
        if end > self.len() {
            return Ok(None);
        }

        Node::decode(&self.image[start as usize..end as usize])
            .map(Some)
            .map_err(|source| StorageError::CorruptSlot { index, source })
    }

    fn write_slot(&mut self, index: SlotIndex, node: &Node<R>) -> Result<(), StorageError> {
        let count = slot_count(self.len(), Node::<R>::SIZE);
        if index.get() >= count {
            return Err(StorageError::SlotOutOfBounds {
                index,
                slot_count: count,
            });
        }
        self.check_write("slot write")?;

        let start = index.byte_offset(Node::<R>::SIZE) as usize;
        self.image[start..start + Node::<R>::SIZE].copy_from_slice(&node.encode());
        self.stats.writes += 1;
        self.dirty = true;
        Ok(())
    }

    fn append_slot(&mut self, node: &Node<R>) -> Result<SlotIndex, StorageError> {
        let len = self.len();
        if len < HEADER_SIZE_U64 {
            return Err(StorageError::MissingHeader { len });
        }
        if (len - HEADER_SIZE_U64) % Node::<R>::SIZE as u64 != 0 {
            return Err(StorageError::TornTail { len });
        }
        let count = slot_count(len, Node::<R>::SIZE);
        let index = SlotIndex::new(count)
            .filter(|_| count < SlotIndex::MAX)
            .ok_or(StorageError::SlotSpaceExhausted)?;
        self.check_write("slot append")?;

        self.image.extend_from_slice(&node.encode());
        self.stats.appends += 1;
        self.dirty = true;
        Ok(index)
    }

    fn slot_count(&mut self) -> Result<u32, StorageError> {
        Ok(slot_count(self.len(), Node::<R>::SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Sale;

    fn sale_node(id: i32) -> Node<Sale> {
        Node::leaf(Sale::new(id, "p", 1, 1.0, "d"))
    }

    #[test]
    fn test_new_image_is_empty_tree() {
        let mut slots = MemorySlots::<Sale>::new();
        assert_eq!(slots.image(), (-1i32).to_le_bytes());
        assert_eq!(slots.read_header().expect("header"), None);
        assert!(!slots.is_dirty());
    }

    #[test]
    fn test_append_read_write() {
        let mut slots = MemorySlots::<Sale>::new();
        let a = slots.append_slot(&sale_node(1)).expect("append");
        let b = slots.append_slot(&sale_node(2)).expect("append");
        assert_eq!((a.get(), b.get()), (0, 1));

        let mut node = sale_node(1);
        node.left = Some(b);
        node.height = 2;
        slots.write_slot(a, &node).expect("write");
        slots.write_header(Some(a)).expect("header");

        assert_eq!(slots.read_slot(a).expect("read"), Some(node));
        assert_eq!(slots.read_header().expect("header"), Some(a));
        assert!(slots.read_slot(SlotIndex::new(2).expect("index")).expect("read").is_none());
        assert!(slots.is_dirty());
        assert_eq!(slots.image().len(), 4 + 2 * 64);
        assert_eq!(
            slots.stats(),
            &SlotStats {
                reads: 2,
                writes: 1,
                appends: 2,
                header_writes: 1,
                injected_faults: 0,
            }
        );
    }

    #[test]
    fn test_from_image_requires_header() {
        assert!(matches!(
            MemorySlots::<Sale>::from_image(vec![0, 0]),
            Err(StorageError::MissingHeader { len: 2 })
        ));
    }

    #[test]
    fn test_fail_writes_after_limit() {
        let mut slots = MemorySlots::<Sale>::with_faults(1, FaultConfig::writes_fail_after(1));

        slots.append_slot(&sale_node(1)).expect("first append");
        let result = slots.append_slot(&sale_node(2));
        assert!(matches!(result, Err(StorageError::InjectedFault(_))));

        // Nothing is rolled back and nothing extra is written.
        assert_eq!(slots.slot_count().expect("count"), 1);
        assert_eq!(slots.stats().injected_faults, 1);
    }

    #[test]
    fn test_read_faults_are_deterministic() {
        let faults = FaultConfig {
            read_error_rate: 0.5,
            ..FaultConfig::no_faults()
        };

        let outcomes = |seed| {
            let mut slots = MemorySlots::<Sale>::with_faults(seed, faults.clone());
            slots.append_slot(&sale_node(1)).expect("append");
            let index = SlotIndex::new(0).expect("index");
            (0..32)
                .map(|_| slots.read_slot(index).is_ok())
                .collect::<Vec<_>>()
        };

        let first = outcomes(42);
        assert_eq!(first, outcomes(42));
        assert!(first.iter().any(|ok| *ok));
        assert!(first.iter().any(|ok| !*ok));
    }
}
