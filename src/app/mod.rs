//! Core application logic for DOI Fetcher
//!
//! This module contains the main application components: the identifier
//! source, the progress ledger, the browser session abstraction, page content
//! detection, payload capture and the per-identifier orchestrator.
//!
//! # Examples
//!
//! ```rust,no_run
//! use doi_fetcher::app::{read_identifiers, ProgressLedger};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dois = read_identifiers(Path::new("dois.csv"))?;
//! let ledger = ProgressLedger::open("download_progress.json");
//!
//! for doi in ledger.pending(&dois) {
//!     println!("Still to fetch: {}", doi);
//! }
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod detector;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod run_log;
pub mod session;
pub mod source;

// Re-export main public API
pub use capture::{CaptureStrategy, PayloadCapturer};
pub use detector::{classify, ContentDetector, Detection, TitleMarkers};
pub use ledger::{LedgerStats, ProgressLedger};
pub use models::{count_pdfs, sanitize_filename, Doi, FetchOutcome, PageSnapshot, PageState};
pub use orchestrator::{
    create_shutdown_channel, Orchestrator, OrchestratorConfig, RunCounts, RunEvent, RunSummary,
    SignalHandler,
};
pub use run_log::RunLog;
pub use session::{
    find_chrome_for, BrowserSession, ChromiumSession, LaunchOptions, NativeDownload, SessionPage,
};
pub use source::read_identifiers;
