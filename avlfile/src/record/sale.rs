//! The sale record indexed by the lab data set.
//!
//! Layout (52 bytes, little-endian):
//! - `id`: 4 bytes (`i32`, the key)
//! - `product`: 30 bytes (UTF-8, space padded)
//! - `quantity`: 4 bytes (`i32`)
//! - `price`: 4 bytes (`f32`)
//! - `date`: 10 bytes (UTF-8, space padded)

use crate::record::{Record, RecordError};

/// Width of the `product` field in bytes.
pub const PRODUCT_WIDTH: usize = 30;

/// Width of the `date` field in bytes.
pub const DATE_WIDTH: usize = 10;

const ID_OFFSET: usize = 0;
const PRODUCT_OFFSET: usize = ID_OFFSET + 4;
const QUANTITY_OFFSET: usize = PRODUCT_OFFSET + PRODUCT_WIDTH;
const PRICE_OFFSET: usize = QUANTITY_OFFSET + 4;
const DATE_OFFSET: usize = PRICE_OFFSET + 4;
const SALE_SIZE: usize = DATE_OFFSET + DATE_WIDTH;

/// A single sale.
///
/// Text longer than its field width is truncated on encode (never in the
/// middle of a character), so such a sale does not survive a round trip
/// unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Sale {
    pub id: i32,
    pub product: String,
    pub quantity: i32,
    pub price: f32,
    pub date: String,
}

impl Sale {
    #[must_use]
    pub fn new(
        id: i32,
        product: impl Into<String>,
        quantity: i32,
        price: f32,
        date: impl Into<String>,
    ) -> Self {
        Self {
            id,
            product: product.into(),
            quantity,
            price,
            date: date.into(),
        }
    }
}

impl Record for Sale {
    type Key = i32;

    const SIZE: usize = SALE_SIZE;

    fn key(&self) -> i32 {
        self.id
    }

    fn encode(&self, dst: &mut [u8]) {
        dst[ID_OFFSET..PRODUCT_OFFSET].copy_from_slice(&self.id.to_le_bytes());
        write_text(&mut dst[PRODUCT_OFFSET..QUANTITY_OFFSET], &self.product);
        dst[QUANTITY_OFFSET..PRICE_OFFSET].copy_from_slice(&self.quantity.to_le_bytes());
        dst[PRICE_OFFSET..DATE_OFFSET].copy_from_slice(&self.price.to_le_bytes());
        write_text(&mut dst[DATE_OFFSET..SALE_SIZE], &self.date);
    }

    fn decode(src: &[u8]) -> Result<Self, RecordError> {
        if src.len() != SALE_SIZE {
            return Err(RecordError::BufferSize {
                expected: SALE_SIZE,
                actual: src.len(),
            });
        }

        Ok(Self {
            id: read_i32(src, ID_OFFSET),
            product: read_text(&src[PRODUCT_OFFSET..QUANTITY_OFFSET], "product")?,
            quantity: read_i32(src, QUANTITY_OFFSET),
            price: f32::from_le_bytes([
                src[PRICE_OFFSET],
                src[PRICE_OFFSET + 1],
                src[PRICE_OFFSET + 2],
                src[PRICE_OFFSET + 3],
            ]),
            date: read_text(&src[DATE_OFFSET..SALE_SIZE], "date")?,
        })
    }
}

impl std::fmt::Display for Sale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "id={} product={:?} quantity={} price={:.2} date={}",
            self.id, self.product, self.quantity, self.price, self.date
        )
    }
}

fn read_i32(src: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        src[offset],
        src[offset + 1],
        src[offset + 2],
        src[offset + 3],
    ])
}

/// Copy `text` into `dst`, truncating on a char boundary and padding with spaces.
fn write_text(dst: &mut [u8], text: &str) {
    let mut end = text.len().min(dst.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    dst[..end].copy_from_slice(&text.as_bytes()[..end]);
    dst[end..].fill(b' ');
}

fn read_text(src: &[u8], field: &'static str) -> Result<String, RecordError> {
    let text = std::str::from_utf8(src).map_err(|_| RecordError::InvalidText { field })?;
    Ok(text.trim_end_matches([' ', '\0']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(sale: &Sale) -> Vec<u8> {
        let mut buf = vec![0u8; Sale::SIZE];
        sale.encode(&mut buf);
        buf
    }

    #[test]
    fn test_size_matches_layout() {
        assert_eq!(Sale::SIZE, 52);
    }

    #[test]
    fn test_encode_decode() {
        let sale = Sale::new(7, "Producto7", 4, 2.1, "2025-01-07");
        let buf = encoded(&sale);

        assert_eq!(&buf[0..4], &7i32.to_le_bytes());
        assert_eq!(&buf[4..13], b"Producto7");
        assert!(buf[13..34].iter().all(|&b| b == b' '));

        let decoded = Sale::decode(&buf).expect("decode");
        assert_eq!(decoded, sale);
        assert_eq!(decoded.key(), 7);
    }

    #[test]
    fn test_long_text_is_truncated() {
        let sale = Sale::new(1, "x".repeat(40), 1, 1.0, "2025-03-30T10:00");
        let decoded = Sale::decode(&encoded(&sale)).expect("decode");

        assert_eq!(decoded.product, "x".repeat(PRODUCT_WIDTH));
        assert_eq!(decoded.date, "2025-03-30");
    }

    #[test]
    fn test_truncation_keeps_whole_characters() {
        // 29 ASCII bytes followed by a two-byte character that would straddle the field end
        let product = format!("{}é", "a".repeat(29));
        let decoded = Sale::decode(&encoded(&Sale::new(1, product, 1, 1.0, ""))).expect("decode");

        assert_eq!(decoded.product, "a".repeat(29));
    }

    #[test]
    fn test_trailing_nul_padding_is_stripped() {
        let mut buf = encoded(&Sale::new(3, "abc", 1, 1.0, "2025"));
        buf[PRODUCT_OFFSET + 3..QUANTITY_OFFSET].fill(0);

        let decoded = Sale::decode(&buf).expect("decode");
        assert_eq!(decoded.product, "abc");
    }

    #[test]
    fn test_decode_wrong_size() {
        let result = Sale::decode(&[0u8; 10]);
        assert_eq!(
            result,
            Err(RecordError::BufferSize {
                expected: 52,
                actual: 10
            })
        );
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let mut buf = encoded(&Sale::new(3, "abc", 1, 1.0, "2025"));
        buf[DATE_OFFSET] = 0xFF;

        let result = Sale::decode(&buf);
        assert_eq!(result, Err(RecordError::InvalidText { field: "date" }));
    }
}
