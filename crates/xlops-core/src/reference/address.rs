//! Range and cell reference types

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use super::column::column_index_to_letters;

/// Exactly one run of letters followed by one run of digits
static SINGLE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+[0-9]+$").expect("single-cell pattern is valid"));

/// An address understood by the engine (e.g., "B2:E5", "C:C", "A1")
///
/// The string is not validated. A malformed or out-of-sheet reference only
/// fails once the engine tries to resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RangeReference {
    address: String,
}

impl RangeReference {
    /// Wrap an address string as-is
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// A whole-column range (`"C"` becomes `"C:C"`)
    pub fn column(column: &str) -> Self {
        Self::columns(column, column)
    }

    /// A range spanning whole columns (`"B"`, `"F"` becomes `"B:F"`)
    pub fn columns(start: &str, end: &str) -> Self {
        Self::from_address(format!("{}:{}", start, end))
    }

    /// A range spanning whole rows, 1-based and inclusive (`2`, `3` becomes `"2:3"`)
    ///
    /// # Examples
    /// ```
    /// use xlops_core::RangeReference;
    ///
    /// assert_eq!(RangeReference::rows(2, 3).unwrap().address(), "2:3");
    /// assert!(RangeReference::rows(0, 3).is_err());
    /// assert!(RangeReference::rows(4, 3).is_err());
    /// ```
    pub fn rows(first: u32, last: u32) -> Result<Self> {
        if first < 1 {
            return Err(Error::invalid_argument("row number must be >= 1"));
        }
        if last < first {
            return Err(Error::invalid_argument(format!(
                "last row {} is before first row {}",
                last, first
            )));
        }
        Ok(Self::from_address(format!("{}:{}", first, last)))
    }

    /// The rectangle between two cells (`B2`, `E5` becomes `"B2:E5"`)
    pub fn between(start: &CellReference, end: &CellReference) -> Self {
        Self::from_address(format!("{}:{}", start.address(), end.address()))
    }

    /// The address string
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Consume the reference and return the address string
    pub fn into_address(self) -> String {
        self.address
    }
}

impl fmt::Display for RangeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

impl AsRef<str> for RangeReference {
    fn as_ref(&self) -> &str {
        &self.address
    }
}

impl From<RangeReference> for String {
    fn from(range: RangeReference) -> Self {
        range.address
    }
}

/// A reference to exactly one cell (e.g., "A1", "AB100")
///
/// Rows and columns are 1-based and every constructor rejects row 0.
/// [`from_row_column`](Self::from_row_column) and
/// [`from_address`](Self::from_address) also guarantee a non-empty column;
/// [`from_row_and_column_letters`](Self::from_row_and_column_letters) takes
/// its letters unvalidated, so `(1, "")` yields the address `"1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct CellReference {
    range: RangeReference,
}

impl CellReference {
    /// Create a cell reference from a 1-based row and column
    ///
    /// # Examples
    /// ```
    /// use xlops_core::CellReference;
    ///
    /// assert_eq!(CellReference::from_row_column(1, 27).unwrap().address(), "AA1");
    /// assert!(CellReference::from_row_column(0, 1).is_err());
    /// assert!(CellReference::from_row_column(1, 0).is_err());
    /// ```
    pub fn from_row_column(row: u32, column: u32) -> Result<Self> {
        if row < 1 || column < 1 {
            return Err(Error::invalid_argument(format!(
                "row {} / column {} out of range (both must be >= 1)",
                row, column
            )));
        }
        Self::from_row_and_column_letters(row, &column_index_to_letters(column))
    }

    /// Create a cell reference from a single-cell address such as `"B2"`
    ///
    /// Ranges, whole columns, absolute markers and anything other than one
    /// run of letters followed by one run of digits are rejected.
    pub fn from_address(address: &str) -> Result<Self> {
        if !SINGLE_CELL.is_match(address) {
            return Err(Error::invalid_argument(format!(
                "'{}' must reference exactly one cell",
                address
            )));
        }
        Ok(Self {
            range: RangeReference::from_address(address),
        })
    }

    /// Create a cell reference from a 1-based row and column letters
    ///
    /// The letters are taken as-is, so the result is not guaranteed to
    /// reparse through [`from_address`](Self::from_address).
    pub fn from_row_and_column_letters(row: u32, column_letters: &str) -> Result<Self> {
        if row < 1 {
            return Err(Error::invalid_argument(format!(
                "row {} out of range (must be >= 1)",
                row
            )));
        }
        Ok(Self {
            range: RangeReference::from_address(format!("{}{}", column_letters, row)),
        })
    }

    /// The address string
    pub fn address(&self) -> &str {
        self.range.address()
    }

    /// This cell as a general range reference
    pub fn as_range(&self) -> &RangeReference {
        &self.range
    }

    /// The column part of the address (everything before the trailing digits)
    pub fn column_letters(&self) -> &str {
        self.address()
            .trim_end_matches(|c: char| c.is_ascii_digit())
    }

    /// The row part of the address (the trailing digits)
    pub fn row_digits(&self) -> &str {
        &self.address()[self.column_letters().len()..]
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.range, f)
    }
}

impl AsRef<str> for CellReference {
    fn as_ref(&self) -> &str {
        self.address()
    }
}

impl AsRef<RangeReference> for CellReference {
    fn as_ref(&self) -> &RangeReference {
        &self.range
    }
}

impl AsRef<RangeReference> for RangeReference {
    fn as_ref(&self) -> &RangeReference {
        self
    }
}

impl From<CellReference> for RangeReference {
    fn from(cell: CellReference) -> Self {
        cell.range
    }
}

impl From<CellReference> for String {
    fn from(cell: CellReference) -> Self {
        cell.range.address
    }
}

impl TryFrom<String> for CellReference {
    type Error = Error;

    fn try_from(address: String) -> Result<Self> {
        Self::from_address(&address)
    }
}

impl std::str::FromStr for CellReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_address(s)
    }
}
