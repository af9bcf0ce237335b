//! Reference types and the column letter codec
//!
//! This module contains:
//! - [`RangeReference`] - An address handed to the engine as-is (e.g., "B2:E5")
//! - [`CellReference`] - A validated single-cell address (e.g., "AB100")
//! - [`column_index_to_letters`] - Column index to letters (27 = "AA")

mod address;
mod column;

pub use address::{CellReference, RangeReference};
pub use column::{column_index_to_letters, letters_to_column_index};
