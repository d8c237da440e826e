//! Error types for the statement engine
//!
//! Errors are contained at the smallest possible scope: a bad transaction is
//! skipped, a bad file is skipped, a failing account group is skipped. Only a
//! handful of variants abort a whole run (see [`StatementError::is_fatal`]).
//!
//! # Error Categories
//!
//! - **File errors**: missing or unreadable inputs, failed writes
//! - **Format errors**: validation failures and unparseable rows
//! - **Categorization errors**: AI/network failures and rate-limit denials
//! - **Persistence errors**: mapping-table flush failures

use thiserror::Error;

/// Main error type for the statement engine
///
/// Variants carry string context only so errors can be cloned into results
/// and compared in tests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatementError {
    /// Input path does not exist
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// I/O error while reading or writing
    #[error("I/O error: {message}")]
    Io { message: String },

    /// A file or row could not be parsed
    ///
    /// Recoverable: the row (or file) is skipped.
    #[error("Parse error in {path}{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse {
        path: String,
        line: Option<u64>,
        message: String,
    },

    /// A file failed format validation
    ///
    /// Recoverable: the file is skipped and the group continues.
    #[error("Invalid statement file {path}: {message}")]
    Validation { path: String, message: String },

    /// The AI tier failed (network, timeout, malformed response)
    #[error("Categorization failed: {message}")]
    Categorization { message: String },

    /// The AI call budget for the current window is spent
    #[error("AI rate limit reached")]
    RateLimited,

    /// Mapping tables could not be written
    #[error("Failed to persist {path}: {message}")]
    Persistence { path: String, message: String },

    /// Invalid runtime configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Input directory holds no files
    #[error("No input files found in {path}")]
    NoInputFiles { path: String },

    /// Every input file was rejected
    #[error("No readable statement files in {path}: all {count} file(s) skipped")]
    NoReadableFiles { path: String, count: usize },

    /// Cancellation signal observed
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for StatementError {
    fn from(error: std::io::Error) -> Self {
        StatementError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for StatementError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());
        StatementError::Parse {
            path: String::from("<csv>"),
            line,
            message: error.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for StatementError {
    fn from(error: serde_yaml::Error) -> Self {
        StatementError::Parse {
            path: String::from("<yaml>"),
            line: error.location().map(|loc| loc.line() as u64),
            message: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for StatementError {
    fn from(error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            format!("request timed out: {}", error)
        } else {
            error.to_string()
        };
        StatementError::Categorization { message }
    }
}

impl StatementError {
    /// Create a Parse error
    pub fn parse(path: impl Into<String>, line: Option<u64>, message: impl Into<String>) -> Self {
        StatementError::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a Validation error
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        StatementError::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a Persistence error
    pub fn persistence(path: impl Into<String>, message: impl Into<String>) -> Self {
        StatementError::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a Categorization error
    pub fn categorization(message: impl Into<String>) -> Self {
        StatementError::Categorization {
            message: message.into(),
        }
    }

    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        StatementError::Config {
            message: message.into(),
        }
    }

    /// Attach a file path to a Parse error produced by a generic conversion
    pub fn in_file(self, file: &std::path::Path) -> Self {
        match self {
            StatementError::Parse { line, message, .. } => StatementError::Parse {
                path: file.display().to_string(),
                line,
                message,
            },
            other => other,
        }
    }

    /// Errors that abort a whole run rather than a single item
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StatementError::NoInputFiles { .. }
                | StatementError::NoReadableFiles { .. }
                | StatementError::Config { .. }
        )
    }
}
