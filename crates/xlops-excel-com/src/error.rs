//! Error types for the Excel COM bridge client.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to spawn WINE bridge process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Bridge process not running")]
    NotRunning,

    #[error("Failed to send command to bridge: {0}")]
    SendFailed(String),

    #[error("Failed to read response from bridge: {0}")]
    ReadFailed(String),

    #[error("Bridge did not respond within {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Bridge returned error: {0}")]
    Remote(String),

    #[error("Unexpected response data for {0}")]
    UnexpectedResponse(&'static str),

    #[error("Response id {actual} does not match request id {expected}")]
    ResponseMismatch { expected: u64, actual: u64 },

    #[error("WINE not found. Install WINE and ensure 'wine' is in PATH.")]
    WineNotFound,

    #[error("Bridge executable not found at: {0}")]
    BridgeExeNotFound(String),

    #[error("Sheet not found in workbook: {0}")]
    SheetNotFound(String),

    #[error("Cannot delete the current sheet: {0}")]
    CurrentSheetDeletion(String),

    #[error("Cannot read {cell} as {target}: found {value}")]
    Conversion {
        cell: String,
        target: &'static str,
        value: String,
    },

    #[error(transparent)]
    Reference(#[from] xlops_core::Error),

    #[error("Bridge transport lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, BridgeError>;
