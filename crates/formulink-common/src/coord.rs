//! Cell coordinates with Excel-compatible bounds.
//!
//! `CellCoord` stores a 1-based (column, row) pair and refuses to represent
//! anything outside the target format's grid: 1,048,576 rows × 16,384 columns
//! (`XFD`). Column letters use base-26 with 1-based digits, so `A` = 1,
//! `Z` = 26, `AA` = 27.

use core::fmt;

/// Largest addressable row in the target format (1-based).
pub const ROW_LIMIT: u32 = 1_048_576;
/// Largest addressable column in the target format (1-based, `XFD`).
pub const COL_LIMIT: u32 = 16_384;
/// Longest formula text the target format accepts, in characters.
pub const FORMULA_LEN_LIMIT: usize = 8_192;

/// Errors returned when constructing or parsing coordinates.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CoordError {
    #[error("row {0} outside 1..={ROW_LIMIT}")]
    RowOutOfRange(u64),
    #[error("column {0} outside 1..={COL_LIMIT} (A-XFD)")]
    ColOutOfRange(u64),
    #[error("invalid A1 cell address '{0}'")]
    InvalidA1(String),
}

/// A single in-bounds cell position, 1-based on both axes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellCoord {
    row: u32,
    col: u32,
}

impl CellCoord {
    /// Construct from 1-based row and column, rejecting out-of-bounds values.
    pub fn new(row: u32, col: u32) -> Result<Self, CoordError> {
        if row == 0 || row > ROW_LIMIT {
            return Err(CoordError::RowOutOfRange(row as u64));
        }
        if col == 0 || col > COL_LIMIT {
            return Err(CoordError::ColOutOfRange(col as u64));
        }
        Ok(Self { row, col })
    }

    /// Parse an `A1`-style address like `D23` or `XFD1048576`.
    ///
    /// Lowercase letters are accepted and upcased. Anchors (`$`) are not part
    /// of the DSL and are rejected.
    pub fn parse_a1(text: &str) -> Result<Self, CoordError> {
        let trimmed = text.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| CoordError::InvalidA1(text.to_string()))?;
        let (letters, digits) = trimmed.split_at(split);
        if letters.is_empty() || digits.is_empty() {
            return Err(CoordError::InvalidA1(text.to_string()));
        }
        let col = letters_to_column(letters).ok_or_else(|| CoordError::InvalidA1(text.to_string()))?;
        let row: u64 = digits
            .parse()
            .map_err(|_| CoordError::InvalidA1(text.to_string()))?;
        if row == 0 || row > ROW_LIMIT as u64 {
            return Err(CoordError::RowOutOfRange(row));
        }
        if col > COL_LIMIT {
            return Err(CoordError::ColOutOfRange(col as u64));
        }
        Ok(Self { row: row as u32, col })
    }

    /// Combine a column letter string with a 1-based row number.
    pub fn from_parts(letters: &str, row: u32) -> Result<Self, CoordError> {
        let col = letters_to_column(letters)
            .ok_or_else(|| CoordError::InvalidA1(format!("{letters}{row}")))?;
        Self::new(row, col)
    }

    #[inline]
    pub fn row(self) -> u32 {
        self.row
    }

    #[inline]
    pub fn col(self) -> u32 {
        self.col
    }

    /// The column part as letters, e.g. `AB` for 28.
    pub fn column_letters(self) -> String {
        column_to_letters(self.col)
    }

    /// Render as an `A1` address.
    pub fn to_a1(self) -> String {
        format!("{}{}", column_to_letters(self.col), self.row)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.col), self.row)
    }
}

/// Convert a 1-based column index to letters.
pub fn column_to_letters(mut col: u32) -> String {
    let mut buf = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        buf.push((b'A' + rem) as char);
        col = (col - 1) / 26;
    }
    buf.iter().rev().collect()
}

/// Convert column letters to a 1-based index. Lowercase accepted.
///
/// Returns `None` on empty input, non-letter characters, or overflow.
pub fn letters_to_column(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in s.bytes() {
        let upper = ch.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return None;
        }
        col = col.checked_mul(26)?;
        col = col.checked_add((upper - b'A') as u32 + 1)?;
    }
    Some(col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_roundtrip() {
        assert_eq!(column_to_letters(1), "A");
        assert_eq!(column_to_letters(26), "Z");
        assert_eq!(column_to_letters(27), "AA");
        assert_eq!(column_to_letters(COL_LIMIT), "XFD");
        for col in [1u32, 2, 25, 26, 27, 52, 53, 702, 703, COL_LIMIT] {
            assert_eq!(letters_to_column(&column_to_letters(col)), Some(col));
        }
    }

    #[test]
    fn parse_a1_basic() {
        let c = CellCoord::parse_a1("D23").unwrap();
        assert_eq!((c.row(), c.col()), (23, 4));
        assert_eq!(c.to_a1(), "D23");
        let c = CellCoord::parse_a1("xfd1048576").unwrap();
        assert_eq!((c.row(), c.col()), (ROW_LIMIT, COL_LIMIT));
    }

    #[test]
    fn parse_a1_rejects_garbage() {
        for bad in ["", "23", "D", "$D$23", "D0", "D23X", "你好1"] {
            assert!(CellCoord::parse_a1(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn bounds_are_enforced() {
        assert!(CellCoord::new(ROW_LIMIT, COL_LIMIT).is_ok());
        assert_eq!(
            CellCoord::new(ROW_LIMIT + 1, 1),
            Err(CoordError::RowOutOfRange((ROW_LIMIT + 1) as u64))
        );
        assert_eq!(
            CellCoord::new(1, COL_LIMIT + 1),
            Err(CoordError::ColOutOfRange((COL_LIMIT + 1) as u64))
        );
        assert!(CellCoord::parse_a1("XFE1").is_err());
        assert!(CellCoord::parse_a1("A1048577").is_err());
    }
}
