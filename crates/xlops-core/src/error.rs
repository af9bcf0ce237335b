//! Error types for xlops-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building references
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A row, column or address was rejected at construction time
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create a new "invalid argument" error with a message
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
