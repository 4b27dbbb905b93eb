//! Application constants for DOI Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Environment variable naming the Chrome/Chromium executable
    pub const CHROME_EXECUTABLE: &str = "DOI_FETCHER_CHROME";
}

/// Mirror endpoints tried in priority order
pub mod mirrors {
    /// Default mirror base URLs
    pub const DEFAULT_MIRRORS: &[&str] = &["https://sci-hub.st", "https://sci-hub.ru"];
}

/// Timing for navigation, polling and download capture
pub mod timing {
    use super::Duration;

    /// Page navigation timeout
    pub const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

    /// Time allowed for a native download to complete
    pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

    /// Interval between content detection polls
    pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Ceiling for content detection on a single page
    pub const MAX_WAIT: Duration = Duration::from_secs(180);

    /// Pause after content appears, before capture starts
    pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

    /// Pause between identifiers
    pub const IDENTIFIER_DELAY: Duration = Duration::from_millis(500);
}

/// Page title markers and size thresholds used by content detection
pub mod detection {
    /// Title fragment shown while an anti-bot challenge is pending
    pub const CHALLENGE_MARKER: &str = "robot";

    /// Title fragment shown when the mirror has no copy of the document
    pub const UNAVAILABLE_MARKER: &str = "not available";

    /// Files at or below this size are not considered valid PDFs
    pub const MIN_PDF_BYTES: u64 = 1000;
}

/// CSS selectors for page content
pub mod selectors {
    /// Embedded PDF viewer element
    pub const EMBEDDED_PDF: &str = r#"embed[type="application/pdf"]"#;

    /// Frame named for the PDF viewer
    pub const PDF_FRAME: &str = "iframe#pdf";

    /// Any frame whose source is a PDF (source lookup only)
    pub const PDF_SOURCE_FRAME: &str = r#"iframe#pdf, iframe[src*=".pdf"]"#;

    /// Hyperlink to a PDF resource
    pub const PDF_LINK: &str = r#"a[href*=".pdf"]"#;

    /// Save button that navigates to the PDF
    pub const SAVE_CONTROL: &str = r#"button[onclick*="location.href"]"#;
}

/// File operation constants
pub mod files {
    /// Extension for saved documents
    pub const PDF_EXTENSION: &str = "pdf";

    /// Maximum length (in characters) of a sanitized file stem
    pub const MAX_FILENAME_CHARS: usize = 200;

    /// Characters replaced during filename sanitization
    pub const DISALLOWED_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    /// Replacement for disallowed characters
    pub const FILENAME_REPLACEMENT: char = '_';

    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Default identifier CSV file
    pub const DEFAULT_INPUT_FILE: &str = "dois.csv";

    /// Default output directory
    pub const DEFAULT_OUTPUT_DIR: &str = "papers";

    /// Default progress ledger file
    pub const DEFAULT_LEDGER_FILE: &str = "download_progress.json";

    /// Default run log file
    pub const DEFAULT_RUN_LOG: &str = "download_log.txt";

    /// Staging directory name (inside the output directory) for browser downloads
    pub const STAGING_DIR_NAME: &str = ".staging";

    /// CSV column holding the identifier
    pub const DOI_COLUMN: &str = "doi";

    /// Placeholder value meaning "no identifier"
    pub const NO_DOI_PLACEHOLDER: &str = "no doi";
}

/// Browser launch settings
pub mod browser {
    /// Executable names searched on PATH
    pub const EXECUTABLE_CANDIDATES: &[&str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
    ];

    /// Common macOS install location
    pub const MACOS_CHROME_PATH: &str =
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";

    /// Common Windows install location
    pub const WINDOWS_CHROME_PATH: &str =
        r"C:\Program Files\Google\Chrome\Application\chrome.exe";
}

/// Configuration file locations
pub mod config {
    /// Project-local config files, checked in order
    pub const LOCAL_CONFIG_FILES: &[&str] = &["./doi-fetcher.toml", "./config.toml"];

    /// Directory under the user config directory
    pub const CONFIG_DIR_NAME: &str = "doi-fetcher";

    /// File name inside the user config directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";

    /// Timestamp format for run log lines
    pub const RUN_LOG_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";
}

// Re-export commonly used constants for convenience
pub use detection::MIN_PDF_BYTES;
pub use env::CHROME_EXECUTABLE as ENV_CHROME_EXECUTABLE;
pub use files::{PDF_EXTENSION, TEMP_FILE_SUFFIX};
pub use mirrors::DEFAULT_MIRRORS;
