//! Command-line interface components
//!
//! This module contains CLI-specific code for the DOI Fetcher application,
//! including argument parsing, progress display, and operator interaction.

pub mod args;
pub mod commands;
pub mod progress;
pub mod startup;

pub use args::{Cli, Commands, ConfigAction, ConfigArgs, FetchArgs, GlobalArgs, StatusArgs};
pub use commands::{handle_config, handle_fetch, handle_reset_failed, handle_status};
pub use progress::{ProgressDisplay, Tally};
pub use startup::{confirm_start, show_startup_status, StartupStatus};
