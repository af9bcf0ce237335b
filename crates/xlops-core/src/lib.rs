//! # xlops-core
//!
//! Address model for the xlops automation facade.
//!
//! The spreadsheet engine addresses cells and ranges with strings such as
//! `"A1"`, `"B2:E5"` or `"C:C"`. This crate builds those strings from
//! structured coordinates and rejects malformed input before it crosses
//! the boundary to the engine:
//! - [`RangeReference`] - any address the engine understands (unvalidated)
//! - [`CellReference`] - an address guaranteed to denote exactly one cell
//! - [`column_index_to_letters`] / [`letters_to_column_index`] - the
//!   spreadsheet column codec (1 = A, 27 = AA)
//!
//! ## Example
//!
//! ```rust
//! use xlops_core::{CellReference, RangeReference};
//!
//! let cell = CellReference::from_row_column(5, 28).unwrap();
//! assert_eq!(cell.address(), "AB5");
//!
//! let column = RangeReference::column("C");
//! assert_eq!(column.address(), "C:C");
//!
//! assert!(CellReference::from_address("A1:B2").is_err());
//! ```

pub mod error;
pub mod reference;

pub use error::{Error, Result};
pub use reference::{
    column_index_to_letters, letters_to_column_index, CellReference, RangeReference,
};
