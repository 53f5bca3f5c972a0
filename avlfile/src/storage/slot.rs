//! Slot addressing for the index file.
//!
//! The file is a 4-byte header followed by densely packed fixed-size slots:
//!
//! ```text
//! [0, 4)                        header: i32 root slot (-1 = empty tree)
//! [4 + i*size, 4 + (i+1)*size)  slot i
//! ```

/// Header size in bytes.
pub const HEADER_SIZE: usize = 4;

/// Header size as u64 for offset calculations.
pub const HEADER_SIZE_U64: u64 = HEADER_SIZE as u64;

/// On-disk encoding of an absent link (no child, or an empty tree).
pub const NIL: i32 = -1;

/// Position of a slot in append order.
///
/// Always fits in a non-negative `i32`, which is how it is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u32);

impl SlotIndex {
    /// Largest representable slot index.
    pub const MAX: u32 = i32::MAX as u32;

    /// Create a slot index, or `None` if it cannot be stored on disk.
    #[must_use]
    pub const fn new(index: u32) -> Option<Self> {
        if index <= Self::MAX {
            Some(Self(index))
        } else {
            None
        }
    }

    /// The raw slot number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Byte offset of this slot in a file with the given slot size.
    #[must_use]
    pub const fn byte_offset(self, slot_size: usize) -> u64 {
        HEADER_SIZE_U64 + self.0 as u64 * slot_size as u64
    }
}

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode a link for storage, mapping `None` to `NIL`.
#[must_use]
#[allow(clippy::cast_possible_wrap)] // SlotIndex never exceeds i32::MAX
pub const fn encode_link(link: Option<SlotIndex>) -> i32 {
    match link {
        Some(index) => index.0 as i32,
        None => NIL,
    }
}

/// Decode a stored link. Returns the raw value back if it is below `NIL`.
#[allow(clippy::cast_sign_loss)]
pub const fn decode_link(raw: i32) -> Result<Option<SlotIndex>, i32> {
    if raw == NIL {
        Ok(None)
    } else if raw >= 0 {
        Ok(Some(SlotIndex(raw as u32)))
    } else {
        Err(raw)
    }
}

/// Number of whole slots in a file (or image) of `len` bytes.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // clamped to SlotIndex::MAX first
pub const fn slot_count(len: u64, slot_size: usize) -> u32 {
    if len < HEADER_SIZE_U64 {
        return 0;
    }
    let count = (len - HEADER_SIZE_U64) / slot_size as u64;
    if count > SlotIndex::MAX as u64 {
        SlotIndex::MAX
    } else {
        count as u32
    }
}
