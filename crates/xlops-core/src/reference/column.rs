//! Spreadsheet column numbering
//!
//! Columns are numbered in bijective base-26: the digits run from 1 to 26
//! (A to Z) and there is no zero digit, so 26 is "Z" and 27 is "AA".

use crate::error::{Error, Result};

/// Convert a 1-based column index to letters (1 = A, 26 = Z, 27 = AA, 53 = BA).
///
/// Index 0 yields an empty string. No upper bound is enforced here; the
/// engine rejects columns beyond its own limit when the address is used.
///
/// # Examples
/// ```
/// use xlops_core::column_index_to_letters;
///
/// assert_eq!(column_index_to_letters(1), "A");
/// assert_eq!(column_index_to_letters(52), "AZ");
/// assert_eq!(column_index_to_letters(53), "BA");
/// ```
pub fn column_index_to_letters(index: u32) -> String {
    if index < 1 {
        return String::new();
    }

    // Every digit is shifted by one, at every level of the recursion
    let mut letters = column_index_to_letters((index - 1) / 26);
    letters.push((b'A' + ((index - 1) % 26) as u8) as char);
    letters
}

/// Convert column letters to a 1-based index (A = 1, Z = 26, AA = 27).
///
/// Case-insensitive. Fails on empty input, on anything other than ASCII
/// letters, and when the index does not fit in a `u32`.
pub fn letters_to_column_index(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::invalid_argument("empty column letters"));
    }

    let mut index: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(Error::invalid_argument(format!(
                "invalid column letter '{}' in '{}'",
                c, letters
            )));
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        index = index
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .ok_or_else(|| {
                Error::invalid_argument(format!("column '{}' is too large", letters))
            })?;
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index_to_letters() {
        assert_eq!(column_index_to_letters(1), "A");
        assert_eq!(column_index_to_letters(2), "B");
        assert_eq!(column_index_to_letters(26), "Z");
        assert_eq!(column_index_to_letters(27), "AA");
        assert_eq!(column_index_to_letters(28), "AB");
        assert_eq!(column_index_to_letters(52), "AZ");
        assert_eq!(column_index_to_letters(53), "BA");
        assert_eq!(column_index_to_letters(702), "ZZ");
        assert_eq!(column_index_to_letters(703), "AAA");
        assert_eq!(column_index_to_letters(16384), "XFD");
    }

    #[test]
    fn test_column_index_zero_is_empty() {
        assert_eq!(column_index_to_letters(0), "");
    }

    #[test]
    fn test_letters_to_column_index() {
        assert_eq!(letters_to_column_index("A").unwrap(), 1);
        assert_eq!(letters_to_column_index("Z").unwrap(), 26);
        assert_eq!(letters_to_column_index("AA").unwrap(), 27);
        assert_eq!(letters_to_column_index("BA").unwrap(), 53);
        assert_eq!(letters_to_column_index("XFD").unwrap(), 16384);

        // Case insensitive
        assert_eq!(letters_to_column_index("ab").unwrap(), 28);
    }

    #[test]
    fn test_letters_to_column_index_errors() {
        assert!(letters_to_column_index("").is_err());
        assert!(letters_to_column_index("A1").is_err());
        assert!(letters_to_column_index("$A").is_err());
        assert!(letters_to_column_index("Ä").is_err());
        assert!(letters_to_column_index("ZZZZZZZZ").is_err()); // overflows u32
    }

    #[test]
    fn test_largest_representable_column() {
        let letters = column_index_to_letters(u32::MAX);
        assert_eq!(letters_to_column_index(&letters).unwrap(), u32::MAX);
    }
}
