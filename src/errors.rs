//! Error types for DOI Fetcher
//!
//! This module defines the error types for all components of the application.
//! Errors are designed to be actionable and provide clear context for debugging and
//! user feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Progress ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// I/O error writing the ledger file
    #[error("Failed to write progress ledger {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ledger state could not be serialized
    #[error("Failed to serialize progress ledger")]
    Serialize(#[from] serde_json::Error),
}

/// Browser session errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// No usable Chrome/Chromium executable was found
    #[error("Chrome or Chromium not found. Install it or set DOI_FETCHER_CHROME")]
    ExecutableNotFound,

    /// Browser process failed to start
    #[error("Failed to launch browser: {reason}")]
    Launch { reason: String },

    /// Navigation failed
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A browser operation exceeded its time limit
    #[error("{operation} timed out after {seconds} seconds")]
    Timeout { operation: String, seconds: u64 },

    /// Expected element not present on the page
    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    /// The browser reported the download as canceled
    #[error("Download {guid} was canceled by the browser")]
    DownloadCanceled { guid: String },

    /// Download event stream ended before completion
    #[error("Download event stream closed before the download completed")]
    DownloadStreamClosed,

    /// DevTools protocol error
    #[error("DevTools protocol error")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// File I/O error while handling downloads
    #[error("Browser file I/O error")]
    Io(#[from] std::io::Error),
}

/// Payload capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The page offers nothing this strategy can act on
    #[error("No {what} on page")]
    NotApplicable { what: &'static str },

    /// Saved file is missing or too small to be a document
    #[error("Captured file too small: {bytes} bytes (minimum {min} bytes)")]
    Undersized { bytes: u64, min: u64 },

    /// Source reference could not be resolved to an absolute URL
    #[error("Invalid source reference: {reference}")]
    InvalidReference { reference: String },

    /// Browser operation failed
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// File I/O error saving the capture
    #[error("File I/O error saving capture")]
    Io(#[from] std::io::Error),
}

/// Identifier source errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Input file not found
    #[error("Identifier file not found: {path}")]
    NotFound { path: PathBuf },

    /// Required column missing from the header row
    #[error("Identifier file {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    /// CSV parsing error
    #[error("CSV parsing error")]
    Csv(#[from] csv::Error),

    /// I/O error reading identifiers
    #[error("I/O error reading identifiers")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered as TOML
    #[error("Failed to render configuration")]
    Render(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// I/O error reading or writing configuration
    #[error("Configuration file I/O error")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Ledger error
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Browser error
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// Capture error
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Identifier source error
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (the run can move on to the next attempt)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Browser(e) => e.is_transient(),
            AppError::Capture(_) => true,

            AppError::Ledger(_)
            | AppError::Source(_)
            | AppError::Config(_)
            | AppError::Io(_)
            | AppError::Generic { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Ledger(_) => "ledger",
            AppError::Browser(e) => e.category(),
            AppError::Capture(_) => "capture",
            AppError::Source(_) => "source",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

impl BrowserError {
    /// Whether the failure is local to one page attempt
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            BrowserError::ExecutableNotFound | BrowserError::Launch { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            BrowserError::ExecutableNotFound | BrowserError::Launch { .. } => "browser-launch",
            BrowserError::Navigation { .. } => "navigation",
            BrowserError::Timeout { .. } => "timeout",
            BrowserError::ElementNotFound { .. } => "element-not-found",
            BrowserError::DownloadCanceled { .. } | BrowserError::DownloadStreamClosed => {
                "download"
            }
            BrowserError::Cdp(_) => "devtools",
            BrowserError::Io(_) => "io",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Ledger result type alias
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Browser result type alias
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// Capture result type alias
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// Source result type alias
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Config result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
