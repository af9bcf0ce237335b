//! In-memory stand-in for the bridge process.
//!
//! `FakeExcel` answers protocol requests the way the COM bridge does, but
//! keeps workbooks in memory. Every request and response is pushed through
//! its JSON line encoding so the wire format is exercised too.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use xlops_core::{letters_to_column_index, CellReference};
use xlops_excel_com::{BridgeError, ExcelBridge, Transport};
use xlops_protocol::{
    CellValue, Command, FoundCell, Request, Response, ResponseData, ResponseResult, SheetPosition,
    SheetRef,
};

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub cells: BTreeMap<(u32, u32), CellValue>,
    pub struck: HashSet<(u32, u32)>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: BTreeMap::new(),
            struck: HashSet::new(),
        }
    }

    pub fn with_cell(mut self, address: &str, value: impl Into<CellValue>) -> Self {
        let pos = parse_cell(address).expect("test cell address");
        self.cells.insert(pos, value.into());
        self
    }

    pub fn with_struck(mut self, address: &str) -> Self {
        let pos = parse_cell(address).expect("test cell address");
        self.struck.insert(pos);
        self
    }

    pub fn get(&self, address: &str) -> CellValue {
        let pos = parse_cell(address).expect("test cell address");
        self.cells.get(&pos).cloned().unwrap_or(CellValue::Null)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Book {
    pub sheets: Vec<Sheet>,
    pub path: Option<String>,
}

impl Book {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets, path: None }
    }

    pub fn sheet(&self, name: &str) -> &Sheet {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .expect("sheet exists")
    }

    pub fn names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn index_of(&self, sheet: &SheetRef) -> Result<usize, String> {
        match sheet {
            SheetRef::Index(i) if (*i as usize) < self.sheets.len() => Ok(*i as usize),
            SheetRef::Index(i) => Err(format!("Sheet index {i} out of range")),
            SheetRef::Name(name) => self
                .sheets
                .iter()
                .position(|s| &s.name == name)
                .ok_or_else(|| format!("Sheet '{name}' not found")),
        }
    }

    fn sheet_mut(&mut self, sheet: &SheetRef) -> Result<&mut Sheet, String> {
        let index = self.index_of(sheet)?;
        Ok(&mut self.sheets[index])
    }

    fn insert_index(&self, position: SheetPosition, current: &SheetRef) -> Result<usize, String> {
        Ok(match position {
            SheetPosition::First => 0,
            SheetPosition::Last => self.sheets.len(),
            SheetPosition::BeforeCurrent => self.index_of(current)?,
            SheetPosition::AfterCurrent => self.index_of(current)? + 1,
        })
    }
}

#[derive(Debug, Default)]
pub struct State {
    pub initialized: bool,
    pub shut_down: bool,
    pub transport_closed: bool,
    pub books: BTreeMap<u64, Book>,
    pub next_handle: u64,
    /// Saved files, keyed by the path the bridge was given.
    pub files: HashMap<String, Book>,
    /// Names of every command received, in order.
    pub commands: Vec<&'static str>,
    /// Commands that should fail with the given message.
    pub failures: HashMap<&'static str, String>,
}

impl State {
    fn handle(&mut self, command: &Command) -> Result<Option<ResponseData>, String> {
        self.commands.push(command.name());
        if let Some(message) = self.failures.get(command.name()) {
            return Err(message.clone());
        }
        if !self.initialized && !matches!(command, Command::Init | Command::Shutdown) {
            return Err("Excel not initialized. Send 'Init' command first.".into());
        }

        match command {
            Command::Init => {
                self.initialized = true;
                Ok(None)
            }
            Command::CreateWorkbook => Ok(Some(self.register(Book::new(vec![Sheet::new("Sheet1")])))),
            Command::OpenWorkbook { path } => {
                let mut book = self
                    .files
                    .get(path)
                    .cloned()
                    .ok_or_else(|| format!("File not found: {path}"))?;
                book.path = Some(path.clone());
                Ok(Some(self.register(book)))
            }
            Command::SaveWorkbook { workbook, path } => {
                let book = self.book_mut(*workbook)?;
                let target = path
                    .clone()
                    .or_else(|| book.path.clone())
                    .ok_or("Workbook has never been saved")?;
                book.path = Some(target.clone());
                let snapshot = book.clone();
                self.files.insert(target, snapshot);
                Ok(None)
            }
            Command::CloseWorkbook { workbook } => {
                self.books
                    .remove(workbook)
                    .ok_or_else(|| format!("Unknown workbook handle: {workbook}"))?;
                Ok(None)
            }
            Command::SheetNames { workbook } => Ok(Some(ResponseData::SheetNames {
                names: self.book_mut(*workbook)?.names(),
            })),
            Command::CreateSheet {
                workbook,
                name,
                position,
                current,
            } => {
                let book = self.book_mut(*workbook)?;
                if book.sheets.iter().any(|s| &s.name == name) {
                    return Err(format!("Sheet '{name}' already exists"));
                }
                let index = book.insert_index(*position, current)?;
                book.sheets.insert(index, Sheet::new(name));
                Ok(None)
            }
            Command::CopySheet {
                workbook,
                from,
                to,
                position,
                current,
            } => {
                let book = self.book_mut(*workbook)?;
                let source = book.index_of(&SheetRef::Name(from.clone()))?;
                let mut copy = book.sheets[source].clone();
                copy.name = to.clone();
                let index = book.insert_index(*position, current)?;
                book.sheets.insert(index, copy);
                Ok(None)
            }
            Command::DeleteSheet { workbook, name } => {
                let book = self.book_mut(*workbook)?;
                let index = book.index_of(&SheetRef::Name(name.clone()))?;
                if book.sheets.len() == 1 {
                    return Err("A workbook must contain at least one sheet".into());
                }
                book.sheets.remove(index);
                Ok(None)
            }
            Command::WriteValues {
                workbook,
                sheet,
                start,
                values,
            } => {
                let (row, column) = parse_cell(start)?;
                let sheet = self.book_mut(*workbook)?.sheet_mut(sheet)?;
                for (offset, value) in values.iter().enumerate() {
                    let pos = (row, column + offset as u32);
                    if value.is_null() {
                        sheet.cells.remove(&pos);
                    } else {
                        sheet.cells.insert(pos, value.clone());
                    }
                }
                Ok(None)
            }
            Command::ReadValue {
                workbook,
                sheet,
                cell,
            } => {
                let pos = parse_cell(cell)?;
                let sheet = self.book_mut(*workbook)?.sheet_mut(sheet)?;
                let value = sheet.cells.get(&pos).cloned().unwrap_or(CellValue::Null);
                Ok(Some(ResponseData::Value { value }))
            }
            Command::Find {
                workbook,
                sheet,
                range,
                keyword,
                partial,
            } => {
                let bounds = parse_range(range)?;
                let sheet = self.book_mut(*workbook)?.sheet_mut(sheet)?;
                let found = sheet
                    .cells
                    .iter()
                    .filter(|(pos, _)| bounds.contains(**pos))
                    .find(|(_, value)| {
                        let text = value.to_string();
                        if *partial {
                            text.contains(keyword.as_str())
                        } else {
                            text == *keyword
                        }
                    })
                    .map(|(&(row, column), _)| FoundCell { row, column });
                Ok(Some(ResponseData::Found { found }))
            }
            Command::IsStrikethrough {
                workbook,
                sheet,
                range,
            } => {
                let bounds = parse_range(range)?;
                let sheet = self.book_mut(*workbook)?.sheet_mut(sheet)?;
                let flag = bounds
                    .positions()
                    .ok_or("Strikethrough query needs a bounded range")?
                    .all(|pos| sheet.struck.contains(&pos));
                Ok(Some(ResponseData::Flag { flag }))
            }
            Command::CopyAndInsertRows {
                workbook,
                sheet,
                source_sheet,
                source_rows,
                insert_at,
            } => {
                let (first, last) = parse_rows(source_rows)?;
                let count = last - first + 1;
                let book = self.book_mut(*workbook)?;
                let source = book.sheet_mut(source_sheet.as_ref().unwrap_or(sheet))?;

                // Copy before shifting: the source may be the target sheet
                let copied: Vec<((u32, u32), CellValue)> = source
                    .cells
                    .iter()
                    .filter(|((row, _), _)| (first..=last).contains(row))
                    .map(|(&(row, column), value)| ((row - first, column), value.clone()))
                    .collect();

                let target = book.sheet_mut(sheet)?;
                let shifted: BTreeMap<(u32, u32), CellValue> = std::mem::take(&mut target.cells)
                    .into_iter()
                    .map(|((row, column), value)| {
                        let row = if row >= *insert_at { row + count } else { row };
                        ((row, column), value)
                    })
                    .collect();
                target.cells = shifted;
                for ((offset, column), value) in copied {
                    target.cells.insert((insert_at + offset, column), value);
                }
                Ok(None)
            }
            Command::Shutdown => {
                self.books.clear();
                self.shut_down = true;
                Ok(None)
            }
        }
    }

    fn register(&mut self, book: Book) -> ResponseData {
        self.next_handle += 1;
        let handle = self.next_handle;
        self.books.insert(handle, book);
        ResponseData::WorkbookHandle { workbook: handle }
    }

    fn book_mut(&mut self, handle: u64) -> Result<&mut Book, String> {
        self.books
            .get_mut(&handle)
            .ok_or_else(|| format!("Unknown workbook handle: {handle}"))
    }
}

/// Shared handle to an in-memory engine; clones see the same state.
#[derive(Clone, Default)]
pub struct FakeExcel {
    state: Arc<Mutex<State>>,
}

impl FakeExcel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a workbook on the fake filesystem under `path`.
    pub fn with_file(self, path: &str, book: Book) -> Self {
        self.state().files.insert(path.to_string(), book);
        self
    }

    /// Make every `command` fail with `message`.
    pub fn fail_on(&self, command: &'static str, message: &str) {
        self.state().failures.insert(command, message.to_string());
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake engine lock")
    }

    pub fn count(&self, command: &str) -> usize {
        self.state().commands.iter().filter(|c| **c == command).count()
    }

    pub fn bridge(&self) -> ExcelBridge<FakeExcel> {
        ExcelBridge::with_transport(self.clone()).expect("fake bridge init")
    }
}

impl Transport for FakeExcel {
    fn round_trip(&mut self, request: &Request) -> Result<Response, BridgeError> {
        let line = serde_json::to_string(request)?;
        let request: Request = serde_json::from_str(&line)?;

        let result = match self.state().handle(&request.command) {
            Ok(data) => ResponseResult::Ok { data },
            Err(message) => ResponseResult::Error { message },
        };

        let line = serde_json::to_string(&Response {
            id: request.id,
            result,
        })?;
        Ok(serde_json::from_str(&line)?)
    }

    fn close(&mut self) -> Result<(), BridgeError> {
        self.state().transport_closed = true;
        Ok(())
    }
}

/// Inclusive row/column bounds of a parsed range.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    rows: (u32, u32),
    columns: (u32, u32),
}

impl Bounds {
    fn contains(&self, (row, column): (u32, u32)) -> bool {
        (self.rows.0..=self.rows.1).contains(&row)
            && (self.columns.0..=self.columns.1).contains(&column)
    }

    fn positions(&self) -> Option<impl Iterator<Item = (u32, u32)>> {
        if self.rows.1 == u32::MAX || self.columns.1 == u32::MAX {
            return None;
        }
        let columns = self.columns;
        Some((self.rows.0..=self.rows.1).flat_map(move |row| (columns.0..=columns.1).map(move |c| (row, c))))
    }
}

pub fn parse_cell(address: &str) -> Result<(u32, u32), String> {
    let cell = CellReference::from_address(address).map_err(|e| e.to_string())?;
    let column = letters_to_column_index(cell.column_letters()).map_err(|e| e.to_string())?;
    let row = cell
        .row_digits()
        .parse()
        .map_err(|_| format!("Bad row in '{address}'"))?;
    Ok((row, column))
}

fn parse_rows(range: &str) -> Result<(u32, u32), String> {
    let (first, last) = range
        .split_once(':')
        .ok_or_else(|| format!("Not a row range: '{range}'"))?;
    let first: u32 = first.parse().map_err(|_| format!("Bad row range '{range}'"))?;
    let last: u32 = last.parse().map_err(|_| format!("Bad row range '{range}'"))?;
    Ok((first, last))
}

fn parse_range(range: &str) -> Result<Bounds, String> {
    let (start, end) = range.split_once(':').unwrap_or((range, range));

    if start.chars().all(|c| c.is_ascii_digit()) && end.chars().all(|c| c.is_ascii_digit()) {
        let (first, last) = parse_rows(&format!("{start}:{end}"))?;
        return Ok(Bounds {
            rows: (first, last),
            columns: (1, u32::MAX),
        });
    }

    if start.chars().all(|c| c.is_ascii_alphabetic()) && end.chars().all(|c| c.is_ascii_alphabetic()) {
        let first = letters_to_column_index(start).map_err(|e| e.to_string())?;
        let last = letters_to_column_index(end).map_err(|e| e.to_string())?;
        return Ok(Bounds {
            rows: (1, u32::MAX),
            columns: (first, last),
        });
    }

    let (r1, c1) = parse_cell(start)?;
    let (r2, c2) = parse_cell(end)?;
    Ok(Bounds {
        rows: (r1.min(r2), r1.max(r2)),
        columns: (c1.min(c2), c1.max(c2)),
    })
}
