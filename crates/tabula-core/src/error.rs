use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error types for Tabula.
#[derive(Error, Debug)]
pub enum AppError {
    /// A column rule could not be built (no queries, blank attribute name, ...).
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// A job could not be built (no rules, blank URL, ...).
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// A selector query was rejected by the HTML parser.
    #[error("Invalid selector '{selector}': {message}")]
    SelectorError { selector: String, message: String },

    /// HTTP request failed (non-success status, unreadable body, ...).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Unexpected failure while selecting, aligning, or extracting.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// No writer is registered for the requested output format.
    #[error("Format not supported: {0}")]
    UnsupportedFormat(String),

    /// Refused to persist an empty result set.
    #[error("No data to save")]
    NoData,

    /// Filesystem failure while persisting results.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV writer failure.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A job is still running on this runner.
    #[error("A job is already running")]
    JobInProgress,
}

impl AppError {
    /// Coarse classification used when a job terminates with a failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::HttpError(_) | AppError::NetworkError(_) | AppError::Timeout(_) => {
                ErrorKind::Network
            }
            AppError::InvalidRule(_) | AppError::InvalidJob(_) => ErrorKind::InvalidRule,
            AppError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            AppError::IoError(_)
            | AppError::CsvError(_)
            | AppError::SerializationError(_)
            | AppError::NoData => ErrorKind::Io,
            AppError::SelectorError { .. }
            | AppError::ExtractionError(_)
            | AppError::ConfigError(_)
            | AppError::JobInProgress => ErrorKind::Extraction,
        }
    }

    /// Returns true if the failure happened while talking to the remote host.
    pub fn is_network(&self) -> bool {
        self.kind() == ErrorKind::Network
    }
}

/// Failure category carried by [`Outcome::Failure`](crate::models::Outcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRule,
    Network,
    Extraction,
    UnsupportedFormat,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRule => "invalid_rule",
            ErrorKind::Network => "network",
            ErrorKind::Extraction => "extraction",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
