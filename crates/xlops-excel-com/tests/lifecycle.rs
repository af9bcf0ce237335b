mod common;

use common::FakeExcel;
use pretty_assertions::assert_eq;
use xlops_excel_com::{BridgeError, ExcelBridge, Transport};
use xlops_protocol::{Request, Response, ResponseResult};

#[test]
fn test_init_is_sent_first() {
    let engine = FakeExcel::new();
    let _bridge = engine.bridge();

    let state = engine.state();
    assert!(state.initialized);
    assert_eq!(state.commands, vec!["Init"]);
}

#[test]
fn test_dropping_a_workbook_closes_it() {
    let engine = FakeExcel::new();
    let bridge = engine.bridge();

    {
        let _wb = bridge.create_workbook().unwrap();
        assert_eq!(engine.state().books.len(), 1);
    }

    assert!(engine.state().books.is_empty());
    assert_eq!(engine.count("CloseWorkbook"), 1);
}

#[test]
fn test_explicit_close_is_not_repeated_on_drop() {
    let engine = FakeExcel::new();
    let bridge = engine.bridge();

    let wb = bridge.create_workbook().unwrap();
    wb.close().unwrap();

    assert_eq!(engine.count("CloseWorkbook"), 1);
}

#[test]
fn test_failed_close_on_drop_is_swallowed() {
    let engine = FakeExcel::new();
    let bridge = engine.bridge();

    {
        let _wb = bridge.create_workbook().unwrap();
        engine.fail_on("CloseWorkbook", "Excel is busy");
    }

    assert_eq!(engine.count("CloseWorkbook"), 1);
    bridge.shutdown().unwrap();
}

#[test]
fn test_workbooks_release_before_the_application() {
    let engine = FakeExcel::new();
    {
        let bridge = engine.bridge();
        let _first = bridge.create_workbook().unwrap();
        let _second = bridge.create_workbook().unwrap();
    }

    let state = engine.state();
    let tail: Vec<_> = state.commands.iter().rev().take(3).rev().copied().collect();
    assert_eq!(tail, vec!["CloseWorkbook", "CloseWorkbook", "Shutdown"]);
    assert!(state.shut_down);
    assert!(state.transport_closed);
}

#[test]
fn test_explicit_shutdown_happens_once() {
    let engine = FakeExcel::new();
    let bridge = engine.bridge();
    bridge.shutdown().unwrap();

    assert_eq!(engine.count("Shutdown"), 1);
    assert!(engine.state().transport_closed);
}

#[test]
fn test_shutdown_failure_still_closes_transport() {
    let engine = FakeExcel::new();
    let bridge = engine.bridge();
    engine.fail_on("Shutdown", "Quit failed");

    let err = bridge.shutdown().unwrap_err();
    assert!(matches!(err, BridgeError::Remote(message) if message == "Quit failed"));
    assert!(engine.state().transport_closed);
}

#[test]
fn test_init_failure_is_reported() {
    let engine = FakeExcel::new();
    engine.fail_on("Init", "Failed to create Excel.Application");

    let err = ExcelBridge::with_transport(engine.clone()).err().unwrap();
    assert!(matches!(err, BridgeError::Remote(_)));
}

#[test]
fn test_unknown_file_is_a_remote_error() {
    let engine = FakeExcel::new();
    let bridge = engine.bridge();

    let err = bridge.open_workbook_raw_path(r"Z:\missing.xlsx").err().unwrap();
    assert!(matches!(err, BridgeError::Remote(message) if message.contains("missing.xlsx")));
}

/// Answers every request with a stale id.
struct StaleTransport;

impl Transport for StaleTransport {
    fn round_trip(&mut self, request: &Request) -> Result<Response, BridgeError> {
        Ok(Response {
            id: request.id + 100,
            result: ResponseResult::ok(),
        })
    }
}

#[test]
fn test_mismatched_response_id() {
    let err = ExcelBridge::with_transport(StaleTransport).err().unwrap();
    assert!(matches!(
        err,
        BridgeError::ResponseMismatch {
            expected: 1,
            actual: 101
        }
    ));
}
