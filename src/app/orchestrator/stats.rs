//! Run events and the end-of-run summary

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::app::models::Doi;

/// Progress notifications emitted while a run is going
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// The run is about to process `total` identifiers
    Started { total: usize },
    /// Work on one identifier began (`position` is 1-based)
    Processing { doi: Doi, position: usize },
    /// A valid file already existed
    Skipped { doi: Doi, bytes: u64 },
    /// Captured from a mirror
    Downloaded { doi: Doi, mirror: String, bytes: u64 },
    /// Every mirror failed
    Failed { doi: Doi },
    /// A challenge page is waiting for the operator
    ChallengePending { doi: Doi, mirror: String },
    /// The run ended, normally or by interrupt
    Finished { interrupted: bool },
}

/// Counters for identifiers handled during this run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Downloaded during this run
    pub downloaded: usize,
    /// Already present on disk
    pub skipped: usize,
    /// Failed on every mirror
    pub failed: usize,
}

impl RunCounts {
    pub fn processed(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

/// Final report of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Identifiers handed to the run
    pub total: usize,
    /// What happened during this run
    pub this_run: RunCounts,
    /// Ledger downloaded count after the run
    pub ledger_downloaded: usize,
    /// Ledger failed count after the run
    pub ledger_failed: usize,
    /// `.pdf` files in the output directory after the run
    pub pdf_files: usize,
    /// Whether the run stopped on an interrupt
    pub interrupted: bool,
    /// Error that stopped the run early, if any
    pub halted: Option<String>,
    /// When the run started
    pub started_at: DateTime<Local>,
    /// Wall-clock duration
    pub duration: Duration,
}

impl RunSummary {
    /// Identifiers left unprocessed
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.this_run.processed())
    }

    /// Multi-line summary for the terminal
    pub fn report(&self) -> String {
        let mut lines = vec![
            format!(
                "Run {} after {}",
                self.ending(),
                format_duration(self.duration)
            ),
            format!(
                "  This run: {} downloaded, {} already present, {} failed",
                self.this_run.downloaded, self.this_run.skipped, self.this_run.failed
            ),
            format!(
                "  Ledger: {} downloaded, {} failed",
                self.ledger_downloaded, self.ledger_failed
            ),
            format!("  PDF files in output directory: {}", self.pdf_files),
        ];

        if self.remaining() > 0 {
            lines.push(format!("  Not processed: {}", self.remaining()));
        }
        if let Some(reason) = &self.halted {
            lines.push(format!("  Stopped by: {}", reason));
        }

        lines.join("\n")
    }

    fn ending(&self) -> &'static str {
        if self.halted.is_some() {
            "stopped by error"
        } else if self.interrupted {
            "interrupted"
        } else {
            "finished"
        }
    }
}

/// Format a duration as `1h 02m 03s`, `2m 03s` or `3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total: usize, this_run: RunCounts, interrupted: bool) -> RunSummary {
        RunSummary {
            total,
            this_run,
            ledger_downloaded: 4,
            ledger_failed: 1,
            pdf_files: 4,
            interrupted,
            halted: None,
            started_at: Local::now(),
            duration: Duration::from_secs(75),
        }
    }

    /// Test remaining count after an interrupted run
    #[test]
    fn test_remaining_after_interrupt() {
        let counts = RunCounts {
            downloaded: 1,
            skipped: 1,
            failed: 1,
        };
        let result = summary(5, counts, true);
        assert_eq!(counts.processed(), 3);
        assert_eq!(result.remaining(), 2);

        let report = result.report();
        assert!(report.starts_with("Run interrupted after 1m 15s"));
        assert!(report.contains("Not processed: 2"));
        assert!(report.contains("PDF files in output directory: 4"));
    }

    /// Test the report omits the remaining line for complete runs
    #[test]
    fn test_report_complete_run() {
        let counts = RunCounts {
            downloaded: 2,
            ..Default::default()
        };
        let report = summary(2, counts, false).report();
        assert!(report.starts_with("Run finished"));
        assert!(!report.contains("Not processed"));
    }

    /// Test the report for a run stopped by a ledger error
    #[test]
    fn test_report_halted_run() {
        let mut result = summary(3, RunCounts::default(), false);
        result.halted = Some("disk full".to_string());

        let report = result.report();
        assert!(report.starts_with("Run stopped by error"));
        assert!(report.contains("Ledger: 4 downloaded, 1 failed"));
        assert!(report.contains("PDF files in output directory: 4"));
        assert!(report.contains("Stopped by: disk full"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3)), "3s");
        assert_eq!(format_duration(Duration::from_secs(123)), "2m 03s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }
}
