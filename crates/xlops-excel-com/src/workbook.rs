//! Workbook handle: the ergonomic API over one open Excel workbook.

use std::path::Path;

use xlops_core::{CellReference, RangeReference};
use xlops_protocol::{CellValue, FoundCell, SheetPosition, SheetRef};

use crate::bridge::ExcelBridge;
use crate::convert::FromCellValue;
use crate::error::{BridgeError, Result};
use crate::transport::{ProcessTransport, Transport};

/// How [`Workbook::find`] compares the keyword with cell contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// The whole cell must equal the keyword.
    #[default]
    Whole,
    /// The keyword may appear anywhere in the cell.
    Partial,
}

/// A handle to an open workbook in the Excel COM bridge.
///
/// Operations on this workbook are forwarded to the bridge process and
/// target the *current sheet*, which starts as the first sheet and is
/// changed with [`select_sheet`](Self::select_sheet). The engine handle is
/// closed (without saving) when the workbook is closed or dropped.
pub struct Workbook<'a, T: Transport = ProcessTransport> {
    bridge: &'a ExcelBridge<T>,
    handle: u64,
    current_sheet: SheetRef,
    closed: bool,
}

impl<'a, T: Transport> Workbook<'a, T> {
    /// Take ownership of an engine workbook handle.
    ///
    /// The first sheet becomes current and is pinned by name, so inserting
    /// sheets in front of it does not change which sheet is targeted.
    pub(crate) fn attach(bridge: &'a ExcelBridge<T>, handle: u64) -> Result<Self> {
        let mut workbook = Self {
            bridge,
            handle,
            current_sheet: SheetRef::Index(0),
            closed: false,
        };
        if let Some(first) = workbook.sheet_names()?.into_iter().next() {
            workbook.current_sheet = SheetRef::Name(first);
        }
        Ok(workbook)
    }

    /// Get the internal handle ID.
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// The sheet that cell operations target.
    pub fn current_sheet(&self) -> &SheetRef {
        &self.current_sheet
    }

    // -- Sheets --

    /// Sheet names, in the order the sheets appear in the workbook.
    pub fn sheet_names(&self) -> Result<Vec<String>> {
        self.bridge.sheet_names(self.handle)
    }

    /// Make `name` the current sheet.
    pub fn select_sheet(&mut self, name: &str) -> Result<()> {
        self.ensure_sheet_exists(name)?;
        self.current_sheet = SheetRef::Name(name.to_string());
        Ok(())
    }

    /// Add an empty sheet. The current sheet does not change.
    pub fn create_sheet(&self, name: &str, position: SheetPosition) -> Result<()> {
        self.bridge
            .create_sheet(self.handle, name, position, self.current_sheet.clone())
    }

    /// Copy sheet `from` as a new sheet named `to`. The current sheet does not change.
    pub fn copy_sheet(&self, to: &str, from: &str, position: SheetPosition) -> Result<()> {
        self.ensure_sheet_exists(from)?;
        self.bridge
            .copy_sheet(self.handle, from, to, position, self.current_sheet.clone())
    }

    /// Delete a sheet. The current sheet cannot be deleted.
    pub fn delete_sheet(&self, name: &str) -> Result<()> {
        let names = self.sheet_names()?;
        if !names.iter().any(|n| n == name) {
            return Err(BridgeError::SheetNotFound(name.to_string()));
        }

        let is_current = match &self.current_sheet {
            SheetRef::Name(current) => current == name,
            SheetRef::Index(i) => names.get(*i as usize).is_some_and(|n| n == name),
        };
        if is_current {
            return Err(BridgeError::CurrentSheetDeletion(name.to_string()));
        }

        self.bridge.delete_sheet(self.handle, name)
    }

    fn ensure_sheet_exists(&self, name: &str) -> Result<()> {
        if self.sheet_names()?.iter().any(|n| n == name) {
            Ok(())
        } else {
            Err(BridgeError::SheetNotFound(name.to_string()))
        }
    }

    // -- Cells on the current sheet --

    /// Write values into consecutive cells of one row, starting at `start`.
    ///
    /// Accepts anything that converts to CellValue:
    /// - `&str` / `String` -> String value
    /// - `f64`, `i32`, etc. -> Number value
    /// - `bool` -> Boolean value
    pub fn write<I>(&self, start: &CellReference, values: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<CellValue>,
    {
        let values: Vec<CellValue> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Ok(());
        }
        self.bridge.write_values(
            self.handle,
            self.current_sheet.clone(),
            start.address(),
            values,
        )
    }

    /// Read a cell's raw value.
    pub fn read_value(&self, cell: &CellReference) -> Result<CellValue> {
        self.bridge
            .read_value(self.handle, self.current_sheet.clone(), cell.address())
    }

    /// Read a cell as `V`, failing with [`BridgeError::Conversion`] when
    /// the value has no reading as `V`.
    pub fn read<V: FromCellValue>(&self, cell: &CellReference) -> Result<V> {
        let value = self.read_value(cell)?;
        V::from_cell_value(&value).ok_or_else(|| BridgeError::Conversion {
            cell: cell.address().to_string(),
            target: V::TARGET,
            value: value.to_string(),
        })
    }

    /// Read a cell as `V`, falling back to `V::default()` when the value
    /// cannot be converted. Transport and engine errors still propagate.
    pub fn read_or_default<V: FromCellValue + Default>(&self, cell: &CellReference) -> Result<V> {
        match self.read(cell) {
            Err(BridgeError::Conversion { .. }) => Ok(V::default()),
            other => other,
        }
    }

    /// Search `range` for `keyword`. Returns the first matching cell.
    pub fn find(
        &self,
        range: impl AsRef<RangeReference>,
        keyword: &str,
        mode: MatchMode,
    ) -> Result<Option<FoundCell>> {
        self.bridge.find(
            self.handle,
            self.current_sheet.clone(),
            range.as_ref().address(),
            keyword,
            mode == MatchMode::Partial,
        )
    }

    /// Whether the whole of `range` is formatted with strikethrough.
    pub fn is_strikethrough(&self, range: impl AsRef<RangeReference>) -> Result<bool> {
        self.bridge.is_strikethrough(
            self.handle,
            self.current_sheet.clone(),
            range.as_ref().address(),
        )
    }

    /// Copy `count` whole rows starting at `first_row` and insert them above
    /// row `insert_at` of the current sheet. Rows are 1-based.
    ///
    /// The rows are copied from `source_sheet`, or from the current sheet
    /// when it is `None`.
    pub fn copy_and_insert_rows(
        &self,
        insert_at: u32,
        first_row: u32,
        count: u32,
        source_sheet: Option<&str>,
    ) -> Result<()> {
        if count == 0 {
            return Err(xlops_core::Error::invalid_argument("row count must be >= 1").into());
        }
        if insert_at < 1 {
            return Err(xlops_core::Error::invalid_argument("insert row must be >= 1").into());
        }
        let last_row = first_row.checked_add(count - 1).ok_or_else(|| {
            xlops_core::Error::invalid_argument(format!(
                "{count} rows from row {first_row} overflow"
            ))
        })?;
        let source_rows = RangeReference::rows(first_row, last_row)?;

        let source_sheet = match source_sheet {
            Some(name) => {
                self.ensure_sheet_exists(name)?;
                Some(SheetRef::Name(name.to_string()))
            }
            None => None,
        };

        self.bridge.copy_and_insert_rows(
            self.handle,
            self.current_sheet.clone(),
            source_sheet,
            source_rows.address(),
            insert_at,
        )
    }

    // -- File operations --

    /// Save the workbook to the file it was opened from.
    pub fn save(&self) -> Result<()> {
        self.bridge.save_workbook(self.handle, None)?;
        tracing::info!(workbook = self.handle, "saved workbook");
        Ok(())
    }

    /// Save the workbook to a file path.
    ///
    /// Relative paths are resolved like [`ExcelBridge::open_workbook`] does.
    /// Format is inferred from the extension (.xlsx, .xls, .csv).
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        let wine_path = self.bridge.resolve_path(path.as_ref());
        self.save_raw_path(&wine_path)
    }

    /// Save the workbook using a raw Windows/WINE path (no conversion).
    pub fn save_raw_path(&self, wine_path: &str) -> Result<()> {
        self.bridge
            .save_workbook(self.handle, Some(wine_path.to_string()))?;
        tracing::info!(workbook = self.handle, path = wine_path, "saved workbook");
        Ok(())
    }

    /// Close the workbook without saving.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.bridge.close_workbook(self.handle)?;
        tracing::info!(workbook = self.handle, "closed workbook");
        Ok(())
    }
}

impl<T: Transport> Drop for Workbook<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(workbook = self.handle, "closing workbook on drop failed: {e}");
        }
    }
}
