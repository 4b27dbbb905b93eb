//! Prelude module for DOI Fetcher Library
//!
//! Re-exports the items most integrations need, so a single
//! `use doi_fetcher::prelude::*;` is enough.
//!
//! # Usage
//!
//! ```rust,no_run
//! use doi_fetcher::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let dois = read_identifiers(std::path::Path::new("dois.csv"))?;
//!     let ledger = ProgressLedger::open("download_progress.json");
//!     let pending = ledger.pending(&dois);
//!
//!     let session = Arc::new(ChromiumSession::launch(LaunchOptions::new("papers/.staging")).await?);
//!     let mut orchestrator = Orchestrator::new(OrchestratorConfig::default(), session, ledger, "papers");
//!     let (_tx, shutdown) = create_shutdown_channel();
//!     let summary = orchestrator.run(&pending, shutdown).await?;
//!     println!("{}", summary.report());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components
pub use crate::app::{
    // Browser session
    BrowserSession,
    ChromiumSession,
    LaunchOptions,
    SessionPage,

    // Core orchestration
    Orchestrator,
    OrchestratorConfig,
    RunEvent,
    RunSummary,
    create_shutdown_channel,

    // Data types and bookkeeping
    Doi,
    FetchOutcome,
    PageState,
    ProgressLedger,
    RunLog,
    read_identifiers,
};

// Configuration
pub use crate::config::AppConfig;
