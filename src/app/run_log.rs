//! Append-only run log
//!
//! One timestamped line per finished identifier, e.g.
//! `[2024-03-01 14:22:05] downloaded: 10.1000/xyz`. The log is for humans;
//! failing to write it never stops a run.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use crate::app::models::Doi;
use crate::constants::logging;

/// Outcome label written to the run log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    Downloaded,
    Failed,
}

impl LogOutcome {
    fn label(self) -> &'static str {
        match self {
            LogOutcome::Downloaded => "downloaded",
            LogOutcome::Failed => "failed",
        }
    }
}

/// Human-readable log of per-identifier outcomes
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line; write errors are logged as warnings
    pub fn record(&self, doi: &Doi, outcome: LogOutcome) {
        let timestamp = Local::now().format(logging::RUN_LOG_TIMESTAMP).to_string();
        let line = format_line(&timestamp, doi, outcome);
        if let Err(e) = self.append(&line) {
            warn!("Could not write run log {}: {}", self.path.display(), e);
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

fn format_line(timestamp: &str, doi: &Doi, outcome: LogOutcome) -> String {
    format!("[{}] {}: {}", timestamp, outcome.label(), doi)
}
