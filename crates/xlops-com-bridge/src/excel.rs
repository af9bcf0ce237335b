//! The Excel object model driven through [`DispatchObject`].
//!
//! Every sheet, range and font fetched here is a local guard. Locals drop in
//! reverse order of declaration, so references are released innermost first
//! and none outlive the call that acquired them.

#![cfg(windows)]

use std::collections::HashMap;

use xlops_protocol::{CellError, CellValue, FoundCell, SheetPosition, SheetRef};

use crate::dispatch::{DispatchObject, Variant};

// XlLookAt
const XL_WHOLE: i32 = 1;
const XL_PART: i32 = 2;

// XlFileFormat
const XL_OPEN_XML_WORKBOOK: i32 = 51;
const XL_WORKBOOK_NORMAL: i32 = -4143;
const XL_CSV: i32 = 6;

/// The Excel.Application instance and the workbooks opened through it.
pub struct ExcelApp {
    app: DispatchObject,
    books: DispatchObject,
    workbooks: HashMap<u64, DispatchObject>,
    next_handle: u64,
}

impl ExcelApp {
    pub fn new() -> Result<Self, String> {
        let app = DispatchObject::create_from_progid("Excel.Application")?;

        app.put("Visible", Variant::bool(false))?;
        app.put("DisplayAlerts", Variant::bool(false))?;
        app.put("ScreenUpdating", Variant::bool(false))?;

        let books = app.child("Workbooks")?;

        Ok(Self {
            app,
            books,
            workbooks: HashMap::new(),
            next_handle: 1,
        })
    }

    fn register(&mut self, workbook: DispatchObject) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.workbooks.insert(handle, workbook);
        handle
    }

    fn workbook(&self, handle: u64) -> Result<&DispatchObject, String> {
        self.workbooks
            .get(&handle)
            .ok_or_else(|| format!("Unknown workbook handle: {handle}"))
    }

    pub fn create_workbook(&mut self) -> Result<u64, String> {
        let workbook = self.books.call_object("Add", Vec::new())?;
        Ok(self.register(workbook))
    }

    pub fn open_workbook(&mut self, path: &str) -> Result<u64, String> {
        let workbook = self.books.call_object("Open", vec![Variant::str(path)])?;
        Ok(self.register(workbook))
    }

    /// `Save` in place, or `SaveAs` with a format picked from the extension.
    pub fn save_workbook(&self, handle: u64, path: Option<&str>) -> Result<(), String> {
        let workbook = self.workbook(handle)?;
        let Some(path) = path else {
            workbook.call_method("Save", Vec::new())?;
            return Ok(());
        };

        let lower = path.to_ascii_lowercase();
        let format = if lower.ends_with(".xls") {
            XL_WORKBOOK_NORMAL
        } else if lower.ends_with(".csv") {
            XL_CSV
        } else {
            XL_OPEN_XML_WORKBOOK
        };
        workbook.call_method("SaveAs", vec![Variant::str(path), Variant::i32(format)])?;
        Ok(())
    }

    /// Close without saving and forget the handle.
    pub fn close_workbook(&mut self, handle: u64) -> Result<(), String> {
        let workbook = self
            .workbooks
            .remove(&handle)
            .ok_or_else(|| format!("Unknown workbook handle: {handle}"))?;
        workbook.call_method("Close", vec![Variant::bool(false)])?;
        Ok(())
    }

    // -- Sheets --

    fn sheets(&self, handle: u64) -> Result<DispatchObject, String> {
        self.workbook(handle)?.child("Worksheets")
    }

    fn sheet_count(sheets: &DispatchObject) -> Result<i32, String> {
        sheets
            .get("Count")?
            .as_i32()
            .ok_or_else(|| "Worksheets.Count is not a number".to_string())
    }

    fn sheet_in(sheets: &DispatchObject, sheet: &SheetRef) -> Result<DispatchObject, String> {
        let index = match sheet {
            // Excel counts sheets from 1
            SheetRef::Index(i) => Variant::i32(*i as i32 + 1),
            SheetRef::Name(name) => Variant::str(name),
        };
        sheets
            .item("Item", vec![index])
            .map_err(|e| format!("Sheet '{sheet}' not found: {e}"))
    }

    fn sheet(&self, handle: u64, sheet: &SheetRef) -> Result<DispatchObject, String> {
        let sheets = self.sheets(handle)?;
        Self::sheet_in(&sheets, sheet)
    }

    pub fn sheet_names(&self, handle: u64) -> Result<Vec<String>, String> {
        let sheets = self.sheets(handle)?;
        let count = Self::sheet_count(&sheets)?;
        (1..=count)
            .map(|i| {
                let sheet = sheets.item("Item", vec![Variant::i32(i)])?;
                let name = sheet.get("Name")?;
                name.as_string()
                    .ok_or_else(|| format!("Sheet {i} has no name"))
            })
            .collect()
    }

    /// Add a sheet after the last one, then move it into place.
    pub fn create_sheet(
        &self,
        handle: u64,
        name: &str,
        position: SheetPosition,
        current: &SheetRef,
    ) -> Result<(), String> {
        let sheets = self.sheets(handle)?;
        let last = sheets.item("Item", vec![Variant::i32(Self::sheet_count(&sheets)?)])?;
        let added = sheets.call_named("Add", Vec::new(), vec![("After", Variant::dispatch(&last))])?;
        let added = added
            .as_dispatch()
            .ok_or_else(|| "Worksheets.Add returned Nothing".to_string())?;
        added.put("Name", Variant::str(name))?;
        Self::move_last_sheet(&sheets, position, current)
    }

    /// Copy `from` after the last sheet, rename it, then move it into place.
    pub fn copy_sheet(
        &self,
        handle: u64,
        from: &str,
        to: &str,
        position: SheetPosition,
        current: &SheetRef,
    ) -> Result<(), String> {
        let sheets = self.sheets(handle)?;
        let source = Self::sheet_in(&sheets, &SheetRef::Name(from.to_string()))?;
        let last = sheets.item("Item", vec![Variant::i32(Self::sheet_count(&sheets)?)])?;
        // Worksheet.Copy returns nothing; the copy is the new last sheet
        source.call_named("Copy", Vec::new(), vec![("After", Variant::dispatch(&last))])?;
        let copy = sheets.item("Item", vec![Variant::i32(Self::sheet_count(&sheets)?)])?;
        copy.put("Name", Variant::str(to))?;
        Self::move_last_sheet(&sheets, position, current)
    }

    fn move_last_sheet(
        sheets: &DispatchObject,
        position: SheetPosition,
        current: &SheetRef,
    ) -> Result<(), String> {
        let (anchor, named) = match position {
            SheetPosition::Last => return Ok(()),
            SheetPosition::First => (sheets.item("Item", vec![Variant::i32(1)])?, "Before"),
            SheetPosition::BeforeCurrent => (Self::sheet_in(sheets, current)?, "Before"),
            SheetPosition::AfterCurrent => (Self::sheet_in(sheets, current)?, "After"),
        };
        let last = sheets.item("Item", vec![Variant::i32(Self::sheet_count(sheets)?)])?;
        last.call_named("Move", Vec::new(), vec![(named, Variant::dispatch(&anchor))])?;
        Ok(())
    }

    pub fn delete_sheet(&self, handle: u64, name: &str) -> Result<(), String> {
        let sheet = self.sheet(handle, &SheetRef::Name(name.to_string()))?;
        // DisplayAlerts is off, so Excel does not ask for confirmation
        sheet.call_method("Delete", Vec::new())?;
        Ok(())
    }

    // -- Cells --

    /// Write `values` into one row, from `start` rightwards.
    pub fn write_values(
        &self,
        handle: u64,
        sheet: &SheetRef,
        start: &str,
        values: &[CellValue],
    ) -> Result<(), String> {
        let sheet = self.sheet(handle, sheet)?;
        let first = sheet.item("Range", vec![Variant::str(start)])?;
        for (offset, value) in values.iter().enumerate() {
            let cell = first.item("Offset", vec![Variant::i32(0), Variant::i32(offset as i32)])?;
            cell.put("Value", cell_value_to_variant(value))?;
        }
        Ok(())
    }

    /// The raw `Value2` of a cell: dates come back as serial numbers.
    pub fn read_value(&self, handle: u64, sheet: &SheetRef, cell: &str) -> Result<CellValue, String> {
        let sheet = self.sheet(handle, sheet)?;
        let range = sheet.item("Range", vec![Variant::str(cell)])?;
        let value = range.get("Value2")?;
        Ok(variant_to_cell_value(&value))
    }

    pub fn find(
        &self,
        handle: u64,
        sheet: &SheetRef,
        range: &str,
        keyword: &str,
        partial: bool,
    ) -> Result<Option<FoundCell>, String> {
        let sheet = self.sheet(handle, sheet)?;
        let range = sheet.item("Range", vec![Variant::str(range)])?;
        let look_at = if partial { XL_PART } else { XL_WHOLE };
        let found = range.call_named(
            "Find",
            Vec::new(),
            vec![("What", Variant::str(keyword)), ("LookAt", Variant::i32(look_at))],
        )?;
        let Some(cell) = found.as_dispatch() else {
            return Ok(None);
        };

        let row = cell.get("Row")?.as_i32();
        let column = cell.get("Column")?.as_i32();
        match (row, column) {
            (Some(row), Some(column)) => Ok(Some(FoundCell {
                row: row as u32,
                column: column as u32,
            })),
            _ => Err("Found cell has no position".to_string()),
        }
    }

    /// `Font.Strikethrough`; a range with mixed formatting reads as false.
    pub fn is_strikethrough(&self, handle: u64, sheet: &SheetRef, range: &str) -> Result<bool, String> {
        let sheet = self.sheet(handle, sheet)?;
        let range = sheet.item("Range", vec![Variant::str(range)])?;
        let font = range.child("Font")?;
        let struck = font.get("Strikethrough")?;
        Ok(struck.as_bool().unwrap_or(false))
    }

    /// Copy whole rows and insert them above row `insert_at`.
    pub fn copy_and_insert_rows(
        &self,
        handle: u64,
        sheet: &SheetRef,
        source_sheet: Option<&SheetRef>,
        source_rows: &str,
        insert_at: u32,
    ) -> Result<(), String> {
        let sheets = self.sheets(handle)?;
        let target = Self::sheet_in(&sheets, sheet)?;
        let source = Self::sheet_in(&sheets, source_sheet.unwrap_or(sheet))?;
        let rows = source.item("Range", vec![Variant::str(source_rows)])?;
        rows.call_method("Copy", Vec::new())?;

        let insert_row = target.item("Rows", vec![Variant::i32(insert_at as i32)])?;
        let inserted = insert_row.call_method("Insert", Vec::new());

        // Leave the clipboard empty whether or not the insert worked
        self.app.put("CutCopyMode", Variant::bool(false))?;
        inserted?;
        Ok(())
    }

    /// Close every workbook without saving, restore alerts, and quit.
    pub fn shutdown(mut self) -> Result<(), String> {
        let handles: Vec<u64> = self.workbooks.keys().copied().collect();
        for handle in handles {
            if let Err(e) = self.close_workbook(handle) {
                eprintln!("[xlops-com-bridge] closing workbook {handle} failed: {e}");
            }
        }
        self.app.put("DisplayAlerts", Variant::bool(true))?;
        self.app.call_method("Quit", Vec::new())?;
        Ok(())
    }
}

fn cell_value_to_variant(value: &CellValue) -> Variant {
    match value {
        CellValue::Null => Variant::empty(),
        CellValue::Bool(b) => Variant::bool(*b),
        CellValue::Number(n) => Variant::f64(*n),
        CellValue::String(s) => Variant::str(s),
        // Error values cannot be written
        CellValue::Error(_) => Variant::empty(),
    }
}

fn variant_to_cell_value(variant: &Variant) -> CellValue {
    if variant.is_empty() {
        CellValue::Null
    } else if let Some(b) = variant.as_bool() {
        CellValue::Bool(b)
    } else if let Some(n) = variant.as_f64() {
        CellValue::Number(n)
    } else if let Some(s) = variant.as_string() {
        CellValue::String(s)
    } else if let Some(code) = variant.error_code() {
        CellValue::Error(CellError {
            code: excel_error_name(code),
        })
    } else {
        CellValue::Null
    }
}

/// Worksheet error text for a CVErr SCODE (0x800A07xx).
fn excel_error_name(scode: i32) -> String {
    match (scode as u32) & 0xFFFF {
        2000 => "#NULL!".to_string(),
        2007 => "#DIV/0!".to_string(),
        2015 => "#VALUE!".to_string(),
        2023 => "#REF!".to_string(),
        2029 => "#NAME?".to_string(),
        2036 => "#NUM!".to_string(),
        2042 => "#N/A".to_string(),
        other => format!("#ERR({other})"),
    }
}
