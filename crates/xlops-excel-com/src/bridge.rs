//! Bridge lifecycle and request/response plumbing.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use xlops_protocol::{
    CellValue, Command as BridgeCommand, FoundCell, Request, ResponseData, ResponseResult,
    SheetPosition, SheetRef,
};

use crate::error::{BridgeError, Result};
use crate::transport::{ProcessTransport, Transport};
use crate::workbook::Workbook;

/// Configuration for the Excel COM bridge.
#[derive(Debug, Clone)]
pub struct ExcelBridgeConfig {
    /// Path to the `xlops-com-bridge.exe` Windows executable.
    /// If None, will search in common locations relative to the current binary.
    pub bridge_exe_path: Option<PathBuf>,

    /// Path to the WINE executable. Defaults to "wine".
    pub wine_path: PathBuf,

    /// Optional WINEPREFIX to use (for isolating the WINE environment).
    pub wine_prefix: Option<PathBuf>,

    /// Timeout for waiting for bridge responses.
    pub timeout: Duration,

    /// Directory that relative workbook paths are resolved against.
    /// If None, the directory of the running executable is used.
    pub base_dir: Option<PathBuf>,
}

impl Default for ExcelBridgeConfig {
    fn default() -> Self {
        Self {
            bridge_exe_path: None,
            wine_path: PathBuf::from("wine"),
            wine_prefix: None,
            timeout: Duration::from_secs(30),
            base_dir: None,
        }
    }
}

/// The main handle for communicating with the Excel COM bridge.
///
/// Owns the engine's application object for as long as it lives. Workbooks
/// borrow the bridge, so every workbook is released before the application
/// is shut down. Dropping a bridge that was not shut down explicitly sends
/// `Shutdown` and logs any failure.
pub struct ExcelBridge<T: Transport = ProcessTransport> {
    transport: Mutex<T>,
    next_id: AtomicU64,
    base_dir: Option<PathBuf>,
    released: AtomicBool,
}

impl ExcelBridge<ProcessTransport> {
    /// Start the bridge process and initialize Excel.
    pub fn start(config: ExcelBridgeConfig) -> Result<Self> {
        let transport = ProcessTransport::spawn(&config)?;
        Ok(Self::with_transport(transport)?.with_base_dir(config.base_dir))
    }
}

impl<T: Transport> ExcelBridge<T> {
    /// Wrap an already-connected transport and initialize Excel through it.
    pub fn with_transport(transport: T) -> Result<Self> {
        let bridge = Self {
            transport: Mutex::new(transport),
            next_id: AtomicU64::new(1),
            base_dir: None,
            released: AtomicBool::new(false),
        };

        // Initialize COM and Excel
        bridge.send_command(BridgeCommand::Init)?;

        Ok(bridge)
    }

    /// Resolve relative workbook paths against `base_dir` instead of the
    /// executable's directory.
    pub fn with_base_dir(mut self, base_dir: Option<PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }

    /// Send a command to the bridge and wait for the response.
    fn send_command(&self, command: BridgeCommand) -> Result<Option<ResponseData>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id, command = command.name(), "sending bridge command");

        let request = Request { id, command };
        let response = {
            let mut transport = self.transport.lock().map_err(|_| BridgeError::Poisoned)?;
            transport.round_trip(&request)?
        };

        if response.id != id {
            return Err(BridgeError::ResponseMismatch {
                expected: id,
                actual: response.id,
            });
        }

        match response.result {
            ResponseResult::Ok { data } => Ok(data),
            ResponseResult::Error { message } => Err(BridgeError::Remote(message)),
        }
    }

    /// Send a command whose response carries no data.
    fn send_unit(&self, command: BridgeCommand) -> Result<()> {
        self.send_command(command)?;
        Ok(())
    }

    /// Create a new empty workbook.
    pub fn create_workbook(&self) -> Result<Workbook<'_, T>> {
        let data = self.send_command(BridgeCommand::CreateWorkbook)?;
        match data {
            Some(ResponseData::WorkbookHandle { workbook }) => {
                tracing::info!(workbook, "created workbook");
                Workbook::attach(self, workbook)
            }
            _ => Err(BridgeError::UnexpectedResponse("CreateWorkbook")),
        }
    }

    /// Open an existing workbook from a file path.
    ///
    /// Relative paths are resolved against the configured base directory
    /// (by default the directory of the running executable) and then
    /// converted to a WINE path.
    pub fn open_workbook(&self, path: impl AsRef<Path>) -> Result<Workbook<'_, T>> {
        let wine_path = self.resolve_path(path.as_ref());
        self.open_workbook_raw_path(&wine_path)
    }

    /// Open a workbook using a raw Windows/WINE path (no conversion).
    pub fn open_workbook_raw_path(&self, wine_path: &str) -> Result<Workbook<'_, T>> {
        let data = self.send_command(BridgeCommand::OpenWorkbook {
            path: wine_path.to_string(),
        })?;
        match data {
            Some(ResponseData::WorkbookHandle { workbook }) => {
                tracing::info!(workbook, path = wine_path, "opened workbook");
                Workbook::attach(self, workbook)
            }
            _ => Err(BridgeError::UnexpectedResponse("OpenWorkbook")),
        }
    }

    /// Shut down the bridge: close all workbooks, quit Excel, and terminate the process.
    pub fn shutdown(self) -> Result<()> {
        self.release()
    }

    /// Send `Shutdown` once; later calls are no-ops.
    fn release(&self) -> Result<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        tracing::info!("shutting down Excel bridge");
        let shutdown = self.send_unit(BridgeCommand::Shutdown);

        // Reap the process even if Excel refused to quit cleanly
        let mut transport = self.transport.lock().map_err(|_| BridgeError::Poisoned)?;
        let closed = transport.close();

        shutdown.and(closed)
    }

    /// Turn a caller-supplied path into the path the bridge should see.
    pub(crate) fn resolve_path(&self, path: &Path) -> String {
        if is_windows_path(path) {
            return path.display().to_string();
        }
        let base = self.base_dir.clone().or_else(executable_dir);
        linux_to_wine_path(&resolve_workbook_path(path, base.as_deref()))
    }

    // -- Internal methods used by Workbook --

    pub(crate) fn save_workbook(&self, workbook: u64, path: Option<String>) -> Result<()> {
        self.send_unit(BridgeCommand::SaveWorkbook { workbook, path })
    }

    pub(crate) fn close_workbook(&self, workbook: u64) -> Result<()> {
        self.send_unit(BridgeCommand::CloseWorkbook { workbook })
    }

    pub(crate) fn sheet_names(&self, workbook: u64) -> Result<Vec<String>> {
        match self.send_command(BridgeCommand::SheetNames { workbook })? {
            Some(ResponseData::SheetNames { names }) => Ok(names),
            _ => Err(BridgeError::UnexpectedResponse("SheetNames")),
        }
    }

    pub(crate) fn create_sheet(
        &self,
        workbook: u64,
        name: &str,
        position: SheetPosition,
        current: SheetRef,
    ) -> Result<()> {
        self.send_unit(BridgeCommand::CreateSheet {
            workbook,
            name: name.to_string(),
            position,
            current,
        })
    }

    pub(crate) fn copy_sheet(
        &self,
        workbook: u64,
        from: &str,
        to: &str,
        position: SheetPosition,
        current: SheetRef,
    ) -> Result<()> {
        self.send_unit(BridgeCommand::CopySheet {
            workbook,
            from: from.to_string(),
            to: to.to_string(),
            position,
            current,
        })
    }

    pub(crate) fn delete_sheet(&self, workbook: u64, name: &str) -> Result<()> {
        self.send_unit(BridgeCommand::DeleteSheet {
            workbook,
            name: name.to_string(),
        })
    }

    pub(crate) fn write_values(
        &self,
        workbook: u64,
        sheet: SheetRef,
        start: &str,
        values: Vec<CellValue>,
    ) -> Result<()> {
        self.send_unit(BridgeCommand::WriteValues {
            workbook,
            sheet,
            start: start.to_string(),
            values,
        })
    }

    pub(crate) fn read_value(&self, workbook: u64, sheet: SheetRef, cell: &str) -> Result<CellValue> {
        let data = self.send_command(BridgeCommand::ReadValue {
            workbook,
            sheet,
            cell: cell.to_string(),
        })?;
        match data {
            Some(ResponseData::Value { value }) => Ok(value),
            _ => Err(BridgeError::UnexpectedResponse("ReadValue")),
        }
    }

    pub(crate) fn find(
        &self,
        workbook: u64,
        sheet: SheetRef,
        range: &str,
        keyword: &str,
        partial: bool,
    ) -> Result<Option<FoundCell>> {
        let data = self.send_command(BridgeCommand::Find {
            workbook,
            sheet,
            range: range.to_string(),
            keyword: keyword.to_string(),
            partial,
        })?;
        match data {
            Some(ResponseData::Found { found }) => Ok(found),
            _ => Err(BridgeError::UnexpectedResponse("Find")),
        }
    }

    pub(crate) fn is_strikethrough(&self, workbook: u64, sheet: SheetRef, range: &str) -> Result<bool> {
        let data = self.send_command(BridgeCommand::IsStrikethrough {
            workbook,
            sheet,
            range: range.to_string(),
        })?;
        match data {
            Some(ResponseData::Flag { flag }) => Ok(flag),
            _ => Err(BridgeError::UnexpectedResponse("IsStrikethrough")),
        }
    }

    pub(crate) fn copy_and_insert_rows(
        &self,
        workbook: u64,
        sheet: SheetRef,
        source_sheet: Option<SheetRef>,
        source_rows: &str,
        insert_at: u32,
    ) -> Result<()> {
        self.send_unit(BridgeCommand::CopyAndInsertRows {
            workbook,
            sheet,
            source_sheet,
            source_rows: source_rows.to_string(),
            insert_at,
        })
    }
}

impl<T: Transport> Drop for ExcelBridge<T> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("Excel bridge shutdown on drop failed: {e}");
        }
    }
}

/// Resolve a workbook path: absolute paths are kept, relative ones are
/// joined onto `base_dir` (or the current directory when there is none).
pub fn resolve_workbook_path(path: &Path, base_dir: Option<&Path>) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match base_dir {
        Some(base) => base.join(path),
        None => std::env::current_dir().unwrap_or_default().join(path),
    }
}

/// Convert a Linux filesystem path to a WINE (Windows) path.
///
/// WINE maps `/` to `Z:\`, so `/home/user/file.xlsx` becomes `Z:\home\user\file.xlsx`.
/// The WINE prefix's `drive_c` maps to `C:\`.
pub fn linux_to_wine_path(linux_path: &Path) -> String {
    let abs = resolve_workbook_path(linux_path, None);

    // WINE maps the root filesystem to Z:
    format!("Z:{}", abs.display()).replace('/', "\\")
}

/// Whether `path` already names a drive (`C:\...` or `C:/...`).
fn is_windows_path(path: &Path) -> bool {
    let Some(s) = path.to_str() else {
        return false;
    };
    let bytes = s.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

fn executable_dir() -> Option<PathBuf> {
    let mut exe = std::env::current_exe().ok()?;
    exe.pop();
    Some(exe)
}
