//! Tree node encoding.
//!
//! A node is the record bytes followed by three little-endian `i32`s:
//! - `left`: child slot (-1 if none)
//! - `right`: child slot (-1 if none)
//! - `height`: subtree height, at least 1

use crate::record::{Record, RecordError};
use crate::storage::slot::{SlotIndex, decode_link, encode_link};

/// Size of the link fields appended after the record (left, right, height).
pub const LINK_FIELDS_SIZE: usize = 3 * 4;

/// A decoded tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<R> {
    pub payload: R,
    pub left: Option<SlotIndex>,
    pub right: Option<SlotIndex>,
    pub height: i32,
}

impl<R: Record> Node<R> {
    /// Encoded node size in bytes.
    pub const SIZE: usize = R::SIZE + LINK_FIELDS_SIZE;

    /// A childless node of height 1.
    #[must_use]
    pub const fn leaf(payload: R) -> Self {
        Self {
            payload,
            left: None,
            right: None,
            height: 1,
        }
    }

    /// Serialize the node into exactly `Self::SIZE` bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        self.payload.encode(&mut buf[..R::SIZE]);

        let links = &mut buf[R::SIZE..];
        links[0..4].copy_from_slice(&encode_link(self.left).to_le_bytes());
        links[4..8].copy_from_slice(&encode_link(self.right).to_le_bytes());
        links[8..12].copy_from_slice(&self.height.to_le_bytes());
        buf
    }

    /// Deserialize a node from exactly `Self::SIZE` bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, NodeError> {
        if bytes.len() != Self::SIZE {
            return Err(NodeError::BufferSize {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }

        let payload = R::decode(&bytes[..R::SIZE]).map_err(NodeError::Record)?;
        let links = &bytes[R::SIZE..];
        let field = |at: usize| {
            i32::from_le_bytes([links[at], links[at + 1], links[at + 2], links[at + 3]])
        };

        let left = decode_link(field(0)).map_err(NodeError::InvalidLink)?;
        let right = decode_link(field(4)).map_err(NodeError::InvalidLink)?;
        let height = field(8);
        if height < 1 {
            return Err(NodeError::InvalidHeight(height));
        }

        Ok(Self {
            payload,
            left,
            right,
            height,
        })
    }
}

/// Errors that can occur while decoding a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Buffer is not exactly one node long.
    BufferSize { expected: usize, actual: usize },
    /// Payload could not be decoded.
    Record(RecordError),
    /// A child link is neither -1 nor a slot index.
    InvalidLink(i32),
    /// Stored height is below 1.
    InvalidHeight(i32),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferSize { expected, actual } => {
                write!(f, "node buffer is {actual} bytes, expected {expected}")
            }
            Self::Record(e) => write!(f, "record error: {e}"),
            Self::InvalidLink(raw) => write!(f, "invalid child link {raw}"),
            Self::InvalidHeight(h) => write!(f, "invalid height {h}"),
        }
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Record(e) => Some(e),
            Self::BufferSize { .. } | Self::InvalidLink(_) | Self::InvalidHeight(_) => None,
        }
    }
}
