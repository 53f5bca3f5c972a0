//! Fixed-width record codec.
//!
//! The tree never looks inside a payload except through its key. Everything
//! else goes through `Record::encode` / `Record::decode`, which must always
//! produce and consume exactly `Record::SIZE` bytes.

mod sale;

pub use sale::{DATE_WIDTH, PRODUCT_WIDTH, Sale};

/// A payload that can be stored in a fixed-size slot.
pub trait Record: Clone + std::fmt::Debug {
    /// Ordering key. Keys are unique within a tree.
    type Key: Ord + Copy + std::fmt::Debug + std::fmt::Display;

    /// Encoded size in bytes.
    const SIZE: usize;

    /// The key this record is indexed by.
    fn key(&self) -> Self::Key;

    /// Write the record into `dst`, which is exactly `Self::SIZE` bytes long.
    fn encode(&self, dst: &mut [u8]);

    /// Read a record back from exactly `Self::SIZE` bytes.
    fn decode(src: &[u8]) -> Result<Self, RecordError>;
}

/// Errors that can occur while decoding a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Buffer is not `Record::SIZE` bytes.
    BufferSize { expected: usize, actual: usize },
    /// A text field is not valid UTF-8.
    InvalidText { field: &'static str },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferSize { expected, actual } => {
                write!(f, "record buffer is {actual} bytes, expected {expected}")
            }
            Self::InvalidText { field } => write!(f, "field '{field}' is not valid UTF-8"),
        }
    }
}

impl std::error::Error for RecordError {}
