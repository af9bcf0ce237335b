//! Native Linux client library for Excel COM automation via a WINE bridge process.
//!
//! This crate spawns a Windows `.exe` under WINE that automates Excel through COM,
//! communicating over JSON-over-stdio. It provides a typed Rust API for
//! creating/opening workbooks, managing sheets, reading/writing cells,
//! searching ranges, copying rows and saving files. Cells and ranges are
//! addressed with [`CellReference`] and [`RangeReference`] from `xlops-core`.
//!
//! # Architecture
//!
//! ```text
//! Your Rust code (native Linux)
//!     └── ExcelBridge (this crate)
//!           └── spawns: wine xlops-com-bridge.exe
//!                 └── COM: Excel.Application
//! ```
//!
//! Engine resources are released by ownership: a [`Workbook`] borrows the
//! [`ExcelBridge`] and closes its engine workbook when dropped, and the
//! bridge quits Excel when it is shut down or dropped.
//!
//! # Example
//!
//! ```rust,no_run
//! use xlops_core::{CellReference, RangeReference};
//! use xlops_excel_com::{ExcelBridge, ExcelBridgeConfig, MatchMode};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = ExcelBridge::start(ExcelBridgeConfig::default())?;
//!     {
//!         let mut wb = bridge.open_workbook("template.xlsx")?;
//!         wb.select_sheet("Sheet2")?;
//!         wb.write(&CellReference::from_row_column(1, 1)?, ["1", "2", "3"])?;
//!         let total: f64 = wb.read(&CellReference::from_address("B2")?)?;
//!         println!("B2 = {total}");
//!         if let Some(hit) = wb.find(RangeReference::column("C"), "total", MatchMode::Whole)? {
//!             println!("found at row {} column {}", hit.row, hit.column);
//!         }
//!         wb.save_as("output.xlsx")?;
//!     }
//!     bridge.shutdown()?;
//!     Ok(())
//! }
//! ```

mod bridge;
mod convert;
pub mod error;
mod transport;
mod workbook;

pub use bridge::{linux_to_wine_path, resolve_workbook_path, ExcelBridge, ExcelBridgeConfig};
pub use convert::FromCellValue;
pub use error::{BridgeError, Result};
pub use transport::{ProcessTransport, Transport};
pub use workbook::{MatchMode, Workbook};
pub use xlops_protocol::{CellValue, FoundCell, SheetPosition, SheetRef};
