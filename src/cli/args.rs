//! Command-line argument parsing for DOI Fetcher
//!
//! This module defines the CLI structure using clap derive macros: the fetch
//! run itself, ledger inspection and maintenance, and configuration helpers.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// DOI Fetcher - Download PDFs for a list of DOIs through a browser
#[derive(Parser, Debug)]
#[command(
    name = "doi_fetcher",
    version,
    about = "Download PDFs for a list of DOIs through a real browser session",
    long_about = "Reads DOIs from a CSV file and fetches each document through a browser,
trying mirrors in order. Anti-bot challenges are completed by hand in the browser window.
Progress is recorded so interrupted runs resume where they stopped."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every pending DOI from the input file
    Fetch(FetchArgs),

    /// Show ledger counts and what is left to do
    Status(StatusArgs),

    /// Forget failed DOIs so the next run retries them
    ResetFailed,

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// CSV file with a "doi" column
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Directory for downloaded PDFs
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Mirror base URL (repeat to try several, in order)
    #[arg(short, long = "mirror", value_name = "URL")]
    pub mirrors: Vec<String>,

    /// Process at most this many pending DOIs
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Start without waiting for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Run the browser without a window (challenges cannot be completed)
    #[arg(long)]
    pub headless: bool,

    /// Show what would be fetched without starting a browser
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the status command
#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    /// CSV file to compare against the ledger
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Where to write it (default: user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logging level requested by flags, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl FetchArgs {
    /// Check argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if self.limit == Some(0) {
            return Err("--limit must be greater than 0".to_string());
        }

        if let Some(bad) = self.mirrors.iter().find(|m| url::Url::parse(m).is_err()) {
            return Err(format!("Invalid mirror URL: {}", bad));
        }

        Ok(())
    }
}
