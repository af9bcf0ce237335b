//! xlops COM bridge: a Windows process that drives Excel through COM,
//! controlled by JSON commands over stdin/stdout.
//!
//! Cross-compiled from Linux and run under WINE.
//!
//! Protocol: one JSON object per line.
//! - `Request` objects arrive on stdin
//! - `Response` objects leave on stdout
//! - diagnostics go to stderr, never stdout

#[cfg(windows)]
mod dispatch;
#[cfg(windows)]
mod excel;

#[cfg(not(windows))]
fn main() {
    eprintln!("xlops-com-bridge must be compiled for Windows (--target x86_64-pc-windows-gnu)");
    eprintln!("and run under WINE on Linux.");
    std::process::exit(1);
}

#[cfg(windows)]
fn main() {
    use std::io::{self, BufRead, Write};

    use xlops_protocol::{Command, Request, Response, ResponseResult};

    eprintln!("[xlops-com-bridge] Starting up...");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut excel: Option<excel::ExcelApp> = None;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[xlops-com-bridge] stdin read error: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (response, shutdown) = match serde_json::from_str::<Request>(line) {
            Ok(request) => (
                handle_command(&mut excel, &request),
                matches!(request.command, Command::Shutdown),
            ),
            Err(e) => {
                eprintln!("[xlops-com-bridge] JSON parse error: {e}");
                eprintln!("[xlops-com-bridge] Line was: {line}");
                // The id is unknown, so answer with 0
                let response = Response {
                    id: 0,
                    result: ResponseResult::error(format!("JSON parse error: {e}")),
                };
                (response, false)
            }
        };

        match serde_json::to_string(&response) {
            Ok(json) => {
                let _ = writeln!(out, "{json}");
                let _ = out.flush();
            }
            Err(e) => eprintln!("[xlops-com-bridge] cannot encode response: {e}"),
        }

        // Shutdown has consumed the app whether or not Quit worked
        if shutdown {
            eprintln!("[xlops-com-bridge] Shutdown handled, exiting.");
            break;
        }
    }

    // The client went away without Shutdown; do not leave Excel running
    if let Some(app) = excel.take() {
        eprintln!("[xlops-com-bridge] stdin closed, shutting down Excel...");
        if let Err(e) = app.shutdown() {
            eprintln!("[xlops-com-bridge] shutdown failed: {e}");
        }
        uninit_com();
    }

    eprintln!("[xlops-com-bridge] Process exiting.");
}

#[cfg(windows)]
fn handle_command(
    excel: &mut Option<excel::ExcelApp>,
    request: &xlops_protocol::Request,
) -> xlops_protocol::Response {
    use xlops_protocol::{Command, Response, ResponseData, ResponseResult};

    let result = match &request.command {
        Command::Init => init_com_and_excel(excel),
        Command::CreateWorkbook => with_excel(excel, |app| {
            let workbook = app.create_workbook()?;
            Ok(ResponseResult::with_data(ResponseData::WorkbookHandle { workbook }))
        }),
        Command::OpenWorkbook { path } => with_excel(excel, |app| {
            let workbook = app.open_workbook(path)?;
            Ok(ResponseResult::with_data(ResponseData::WorkbookHandle { workbook }))
        }),
        Command::SaveWorkbook { workbook, path } => with_excel(excel, |app| {
            app.save_workbook(*workbook, path.as_deref())?;
            Ok(ResponseResult::ok())
        }),
        Command::CloseWorkbook { workbook } => with_excel(excel, |app| {
            app.close_workbook(*workbook)?;
            Ok(ResponseResult::ok())
        }),
        Command::SheetNames { workbook } => with_excel(excel, |app| {
            let names = app.sheet_names(*workbook)?;
            Ok(ResponseResult::with_data(ResponseData::SheetNames { names }))
        }),
        Command::CreateSheet {
            workbook,
            name,
            position,
            current,
        } => with_excel(excel, |app| {
            app.create_sheet(*workbook, name, *position, current)?;
            Ok(ResponseResult::ok())
        }),
        Command::CopySheet {
            workbook,
            from,
            to,
            position,
            current,
        } => with_excel(excel, |app| {
            app.copy_sheet(*workbook, from, to, *position, current)?;
            Ok(ResponseResult::ok())
        }),
        Command::DeleteSheet { workbook, name } => with_excel(excel, |app| {
            app.delete_sheet(*workbook, name)?;
            Ok(ResponseResult::ok())
        }),
        Command::WriteValues {
            workbook,
            sheet,
            start,
            values,
        } => with_excel(excel, |app| {
            app.write_values(*workbook, sheet, start, values)?;
            Ok(ResponseResult::ok())
        }),
        Command::ReadValue {
            workbook,
            sheet,
            cell,
        } => with_excel(excel, |app| {
            let value = app.read_value(*workbook, sheet, cell)?;
            Ok(ResponseResult::with_data(ResponseData::Value { value }))
        }),
        Command::Find {
            workbook,
            sheet,
            range,
            keyword,
            partial,
        } => with_excel(excel, |app| {
            let found = app.find(*workbook, sheet, range, keyword, *partial)?;
            Ok(ResponseResult::with_data(ResponseData::Found { found }))
        }),
        Command::IsStrikethrough {
            workbook,
            sheet,
            range,
        } => with_excel(excel, |app| {
            let flag = app.is_strikethrough(*workbook, sheet, range)?;
            Ok(ResponseResult::with_data(ResponseData::Flag { flag }))
        }),
        Command::CopyAndInsertRows {
            workbook,
            sheet,
            source_sheet,
            source_rows,
            insert_at,
        } => with_excel(excel, |app| {
            app.copy_and_insert_rows(
                *workbook,
                sheet,
                source_sheet.as_ref(),
                source_rows,
                *insert_at,
            )?;
            Ok(ResponseResult::ok())
        }),
        Command::Shutdown => match excel.take() {
            Some(app) => {
                // `shutdown` consumes the app, so its references are gone before COM is
                let quit = app.shutdown();
                uninit_com();
                match quit {
                    Ok(()) => ResponseResult::ok(),
                    Err(e) => ResponseResult::error(format!("Shutdown failed: {e}")),
                }
            }
            None => ResponseResult::ok(),
        },
    };

    Response {
        id: request.id,
        result,
    }
}

#[cfg(windows)]
fn init_com_and_excel(excel: &mut Option<excel::ExcelApp>) -> xlops_protocol::ResponseResult {
    use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};
    use xlops_protocol::ResponseResult;

    if excel.is_some() {
        return ResponseResult::ok();
    }

    // Excel needs a single-threaded apartment
    unsafe {
        if let Err(e) = CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok() {
            return ResponseResult::error(format!("CoInitializeEx failed: {e}"));
        }
    }
    eprintln!("[xlops-com-bridge] COM initialized (STA)");

    match excel::ExcelApp::new() {
        Ok(app) => {
            eprintln!("[xlops-com-bridge] Excel.Application created");
            *excel = Some(app);
            ResponseResult::ok()
        }
        Err(e) => ResponseResult::error(format!("Failed to create Excel.Application: {e}")),
    }
}

#[cfg(windows)]
fn uninit_com() {
    unsafe {
        windows::Win32::System::Com::CoUninitialize();
    }
    eprintln!("[xlops-com-bridge] COM uninitialized");
}

#[cfg(windows)]
fn with_excel(
    excel: &mut Option<excel::ExcelApp>,
    f: impl FnOnce(&mut excel::ExcelApp) -> Result<xlops_protocol::ResponseResult, String>,
) -> xlops_protocol::ResponseResult {
    use xlops_protocol::ResponseResult;

    match excel.as_mut() {
        Some(app) => f(app).unwrap_or_else(ResponseResult::error),
        None => ResponseResult::error("Excel not initialized. Send 'Init' command first."),
    }
}
