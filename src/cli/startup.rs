//! Startup checks and operator interaction for DOI Fetcher
//!
//! Before a run starts the operator sees what is about to happen: how many
//! identifiers are pending, where files go, and whether a browser was found.
//! A headed run then waits for confirmation so the browser window can be
//! arranged before the first page opens.

use std::io::{self, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::app::{count_pdfs, find_chrome_for, LedgerStats};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Results of startup checks
#[derive(Debug, Clone, Default)]
pub struct StartupStatus {
    /// Identifiers read from the input file
    pub identifiers: usize,
    /// Identifiers the run will process
    pub pending: usize,
    /// Ledger counts before the run
    pub ledger: LedgerStats,
    /// PDFs already in the output directory
    pub pdf_files: usize,
    /// Output directory
    pub output_dir: PathBuf,
    /// Browser executable that will be used
    pub browser: Option<PathBuf>,
}

impl StartupStatus {
    /// Gather startup information for a run
    pub fn gather(config: &AppConfig, identifiers: usize, pending: usize, ledger: LedgerStats) -> Self {
        Self {
            identifiers,
            pending,
            ledger,
            pdf_files: count_pdfs(&config.paths.output_dir),
            output_dir: config.paths.output_dir.clone(),
            browser: find_chrome_for(config.browser.executable.as_deref()),
        }
    }

    /// Check if a run can start
    pub fn is_ready(&self) -> bool {
        self.browser.is_some()
    }

    /// Get a summary message for display
    pub fn summary(&self) -> String {
        if self.pending == 0 {
            "✅ Nothing left to fetch".to_string()
        } else if self.is_ready() {
            format!("✅ Ready to fetch {} DOI(s)", self.pending)
        } else {
            "⚠️  Setup required: Chrome or Chromium not found".to_string()
        }
    }
}

/// Show startup status and recommendations
pub fn show_startup_status(status: &StartupStatus) {
    println!();
    println!("🚀 DOI Fetcher");
    println!("==============");
    println!();
    println!("📄 DOIs in input: {}", status.identifiers);
    println!(
        "📒 Ledger: {} downloaded, {} failed",
        status.ledger.downloaded, status.ledger.failed
    );
    println!("⏳ Pending this run: {}", status.pending);
    println!(
        "📁 Output: {} ({} PDF files)",
        status.output_dir.display(),
        status.pdf_files
    );

    match &status.browser {
        Some(path) => println!("🌐 Browser: {}", path.display()),
        None => {
            println!("🌐 Browser: ❌ Not found");
            println!("   Install Chrome/Chromium or set DOI_FETCHER_CHROME");
        }
    }

    println!();
    println!("Overall: {}", status.summary());
    println!();
}

/// Wait for the operator to press Enter
pub fn confirm_start(headless: bool) -> Result<()> {
    if !headless {
        println!("A browser window will open. If a page asks you to prove you are not a");
        println!("robot, complete the check in that window; the run continues on its own.");
        println!();
    }

    print!("Press Enter to start (Ctrl+C to cancel)... ");
    io::stdout().flush().map_err(AppError::Io)?;

    let mut response = String::new();
    io::stdin().read_line(&mut response).map_err(AppError::Io)?;
    debug!("Operator confirmed start");
    println!();
    Ok(())
}
