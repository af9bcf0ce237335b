//! Shared protocol types for communication between the native client
//! and the Windows COM bridge process running under WINE.
//!
//! The protocol is JSON-over-stdio: one JSON object per line in each direction.
//! Cell and range addresses travel as plain A1-style strings; rows are 1-based.

use serde::{Deserialize, Serialize};

/// A command sent from the client to the bridge process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Monotonically increasing request ID for correlating responses.
    pub id: u64,
    /// The command to execute.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the client can send to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum Command {
    /// Initialize COM and create the Excel.Application instance.
    Init,

    /// Create a new empty workbook. Returns a workbook handle.
    CreateWorkbook,

    /// Open an existing workbook from a file path (Windows path).
    OpenWorkbook { path: String },

    /// Save the workbook in place, or under `path` when given (Windows path).
    SaveWorkbook {
        workbook: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// Close a workbook without saving and release its handle.
    CloseWorkbook { workbook: u64 },

    /// List sheet names in sheet order.
    SheetNames { workbook: u64 },

    /// Add a sheet named `name` at `position`, relative to `current` when needed.
    CreateSheet {
        workbook: u64,
        name: String,
        position: SheetPosition,
        current: SheetRef,
    },

    /// Copy sheet `from` as a new sheet named `to` at `position`.
    CopySheet {
        workbook: u64,
        from: String,
        to: String,
        position: SheetPosition,
        current: SheetRef,
    },

    /// Delete a sheet by name.
    DeleteSheet { workbook: u64, name: String },

    /// Write `values` left to right starting at cell `start`.
    WriteValues {
        workbook: u64,
        sheet: SheetRef,
        start: String,
        values: Vec<CellValue>,
    },

    /// Read a cell's raw value.
    ReadValue {
        workbook: u64,
        sheet: SheetRef,
        cell: String,
    },

    /// Search `range` for `keyword`, matching the whole cell or any part of it.
    Find {
        workbook: u64,
        sheet: SheetRef,
        range: String,
        keyword: String,
        partial: bool,
    },

    /// Whether every cell in `range` is struck through.
    IsStrikethrough {
        workbook: u64,
        sheet: SheetRef,
        range: String,
    },

    /// Copy whole rows (`source_rows`, e.g. "3:4") from `source_sheet`
    /// (or `sheet` when absent) and insert them above row `insert_at` of `sheet`.
    CopyAndInsertRows {
        workbook: u64,
        sheet: SheetRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_sheet: Option<SheetRef>,
        source_rows: String,
        insert_at: u32,
    },

    /// Shut down the bridge: close all workbooks, quit Excel, uninitialize COM.
    Shutdown,
}

impl Command {
    /// The command name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init => "Init",
            Command::CreateWorkbook => "CreateWorkbook",
            Command::OpenWorkbook { .. } => "OpenWorkbook",
            Command::SaveWorkbook { .. } => "SaveWorkbook",
            Command::CloseWorkbook { .. } => "CloseWorkbook",
            Command::SheetNames { .. } => "SheetNames",
            Command::CreateSheet { .. } => "CreateSheet",
            Command::CopySheet { .. } => "CopySheet",
            Command::DeleteSheet { .. } => "DeleteSheet",
            Command::WriteValues { .. } => "WriteValues",
            Command::ReadValue { .. } => "ReadValue",
            Command::Find { .. } => "Find",
            Command::IsStrikethrough { .. } => "IsStrikethrough",
            Command::CopyAndInsertRows { .. } => "CopyAndInsertRows",
            Command::Shutdown => "Shutdown",
        }
    }
}

/// Reference to a worksheet, by 0-based index or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetRef {
    Index(u32),
    Name(String),
}

impl From<&str> for SheetRef {
    fn from(name: &str) -> Self {
        SheetRef::Name(name.to_string())
    }
}

impl From<String> for SheetRef {
    fn from(name: String) -> Self {
        SheetRef::Name(name)
    }
}

impl From<u32> for SheetRef {
    fn from(index: u32) -> Self {
        SheetRef::Index(index)
    }
}

impl std::fmt::Display for SheetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetRef::Index(i) => write!(f, "#{i}"),
            SheetRef::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Where a created or copied sheet lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SheetPosition {
    /// Before the first sheet.
    First,
    /// After the last sheet.
    #[default]
    Last,
    /// Immediately before the current sheet.
    BeforeCurrent,
    /// Immediately after the current sheet.
    AfterCurrent,
}

/// A cell value that can be sent to/from Excel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Error(CellError),
}

/// Excel error values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellError {
    pub code: String,
}

/// A cell located by a search, 1-based as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FoundCell {
    pub row: u32,
    pub column: u32,
}

/// A response sent from the bridge back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to.
    pub id: u64,
    /// The result of the command.
    #[serde(flatten)]
    pub result: ResponseResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseResult {
    #[serde(rename = "ok")]
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ResponseResult {
    /// A successful result without data.
    pub fn ok() -> Self {
        ResponseResult::Ok { data: None }
    }

    /// A successful result carrying `data`.
    pub fn with_data(data: ResponseData) -> Self {
        ResponseResult::Ok { data: Some(data) }
    }

    /// A failed result.
    pub fn error(message: impl Into<String>) -> Self {
        ResponseResult::Error {
            message: message.into(),
        }
    }
}

/// Data returned in successful responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Handle to a newly created/opened workbook.
    WorkbookHandle { workbook: u64 },
    /// Sheet names in sheet order.
    SheetNames { names: Vec<String> },
    /// A cell value.
    Value { value: CellValue },
    /// A yes/no answer.
    Flag { flag: bool },
    /// Result of a search; `None` when nothing matched.
    // Must stay last: a missing `found` deserializes as `None`.
    Found { found: Option<FoundCell> },
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// A short name for the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CellValue::Null => "empty",
            CellValue::Bool(_) => "bool",
            CellValue::Number(_) => "number",
            CellValue::String(_) => "string",
            CellValue::Error(_) => "error",
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<f32> for CellValue {
    fn from(n: f32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<u32> for CellValue {
    fn from(n: u32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => write!(f, "<empty>"),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Error(e) => write!(f, "{}", e.code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request = Request {
            id: 7,
            command: Command::WriteValues {
                workbook: 1,
                sheet: SheetRef::Name("Sheet2".into()),
                start: "A1".into(),
                values: vec!["1".into(), CellValue::Number(2.0), true.into(), CellValue::Null],
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 7,
                "cmd": "WriteValues",
                "params": {
                    "workbook": 1,
                    "sheet": "Sheet2",
                    "start": "A1",
                    "values": ["1", 2.0, true, null],
                }
            })
        );
    }

    #[test]
    fn test_unit_command_has_no_params() {
        let value = serde_json::to_value(Request {
            id: 1,
            command: Command::Init,
        })
        .unwrap();
        assert_eq!(value, json!({ "id": 1, "cmd": "Init" }));
    }

    #[test]
    fn test_save_in_place_omits_path() {
        let value = serde_json::to_value(Command::SaveWorkbook {
            workbook: 3,
            path: None,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({ "cmd": "SaveWorkbook", "params": { "workbook": 3 } })
        );
    }

    #[test]
    fn test_request_round_trips_through_a_line() {
        let request = Request {
            id: 42,
            command: Command::CopyAndInsertRows {
                workbook: 2,
                sheet: SheetRef::Index(0),
                source_sheet: Some(SheetRef::Name("Sheet2".into())),
                source_rows: "3:4".into(),
                insert_at: 2,
            },
        };
        let line = serde_json::to_string(&request).unwrap();
        assert!(!line.contains('\n'));
        let parsed: Request = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_response_data_shapes() {
        let found: Response = serde_json::from_value(json!({
            "id": 5,
            "status": "ok",
            "data": { "found": { "row": 4, "column": 5 } }
        }))
        .unwrap();
        assert_eq!(
            found.result,
            ResponseResult::with_data(ResponseData::Found {
                found: Some(FoundCell { row: 4, column: 5 })
            })
        );

        let missing: Response = serde_json::from_value(json!({
            "id": 6,
            "status": "ok",
            "data": { "found": null }
        }))
        .unwrap();
        assert_eq!(
            missing.result,
            ResponseResult::with_data(ResponseData::Found { found: None })
        );

        let names: Response = serde_json::from_value(json!({
            "id": 8,
            "status": "ok",
            "data": { "names": ["Sheet1", "検索"] }
        }))
        .unwrap();
        assert_eq!(
            names.result,
            ResponseResult::with_data(ResponseData::SheetNames {
                names: vec!["Sheet1".into(), "検索".into()]
            })
        );

        let empty: Response =
            serde_json::from_value(json!({ "id": 9, "status": "ok" })).unwrap();
        assert_eq!(empty.result, ResponseResult::ok());
    }

    #[test]
    fn test_error_response() {
        let response: Response = serde_json::from_value(json!({
            "id": 3,
            "status": "error",
            "message": "Unknown workbook handle: 9"
        }))
        .unwrap();
        assert_eq!(
            response.result,
            ResponseResult::error("Unknown workbook handle: 9")
        );
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Null.to_string(), "<empty>");
        assert_eq!(CellValue::Bool(true).to_string(), "TRUE");
        assert_eq!(CellValue::Number(3.0).to_string(), "3");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::from("あ").to_string(), "あ");
    }

    #[test]
    fn test_sheet_position_default_is_last() {
        assert_eq!(SheetPosition::default(), SheetPosition::Last);
        assert_eq!(
            serde_json::to_value(SheetPosition::AfterCurrent).unwrap(),
            json!("AfterCurrent")
        );
    }
}
