//! Composite cell keys.
//!
//! A cell at column `x`, row `y` is addressed on the wire by the key `"{x}-{y}"`.
//! Coordinates are 1-indexed and must fall inside the `size x size` grid of
//! their template.

use std::fmt;

use crate::error::MatrixError;

const SEPARATOR: char = '-';

/// One grid position, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellCoord {
    pub x: u32,
    pub y: u32,
}

impl CellCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Render the wire key for this cell.
    pub fn encode(self) -> String {
        format!("{}{SEPARATOR}{}", self.x, self.y)
    }

    /// Parse a wire key.
    ///
    /// Only the canonical form produced by [`CellCoord::encode`] is accepted,
    /// so `"01-2"` or `"+1-2"` are rejected rather than silently aliasing
    /// another cell.
    pub fn decode(key: &str) -> Result<Self, MatrixError> {
        let malformed = || MatrixError::MalformedCoordinate {
            key: key.to_string(),
        };

        let (raw_x, raw_y) = key.split_once(SEPARATOR).ok_or_else(malformed)?;
        let x: u32 = raw_x.parse().map_err(|_| malformed())?;
        let y: u32 = raw_y.parse().map_err(|_| malformed())?;

        let coord = Self { x, y };
        if coord.encode() != key {
            return Err(malformed());
        }
        Ok(coord)
    }

    /// Reject coordinates outside `[1, size]` on either axis.
    pub fn ensure_within(self, size: u32) -> Result<Self, MatrixError> {
        let in_range = |v: u32| (1..=size).contains(&v);
        if in_range(self.x) && in_range(self.y) {
            Ok(self)
        } else {
            Err(MatrixError::OutOfRangeCoordinate {
                key: self.encode(),
                size,
            })
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::CellCoord;
    use crate::error::MatrixError;

    #[test]
    fn encode_joins_axes_with_dash() {
        assert_eq!(CellCoord::new(3, 12).encode(), "3-12");
        assert_eq!(CellCoord::new(3, 12).to_string(), "3-12");
    }

    #[test]
    fn decode_accepts_canonical_keys() {
        let coord = CellCoord::decode("10-2").expect("valid key");
        assert_eq!(coord, CellCoord::new(10, 2));
    }

    #[test]
    fn decode_rejects_malformed_keys() {
        for key in ["", "1", "1-", "-1", "a-b", "1-2-3", "1_2", "01-2", "+1-2", "1--2", " 1-2"] {
            let err = CellCoord::decode(key).expect_err(key);
            assert!(
                matches!(err, MatrixError::MalformedCoordinate { key: ref k } if k == key),
                "unexpected error for '{key}': {err:?}"
            );
        }
    }

    #[test]
    fn range_check_is_inclusive_and_one_indexed() {
        assert!(CellCoord::new(1, 1).ensure_within(5).is_ok());
        assert!(CellCoord::new(5, 5).ensure_within(5).is_ok());

        let err = CellCoord::new(0, 3).ensure_within(5).expect_err("x = 0");
        assert!(matches!(
            err,
            MatrixError::OutOfRangeCoordinate { ref key, size: 5 } if key == "0-3"
        ));
        assert!(CellCoord::new(2, 6).ensure_within(5).is_err());
    }
}
