//! Live progress display for fetch runs
//!
//! Consumes [`RunEvent`]s from the orchestrator on a background task and
//! renders them with indicatif: a bar over the pending identifiers whose
//! message carries the running tally, plus one printed line per outcome.
//! When stderr is not a terminal the bar is hidden by indicatif and the same
//! lines go to stderr as plain text.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::{RunCounts, RunEvent};

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Running tally shown next to the bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub counts: RunCounts,
    pub challenges: usize,
}

impl Tally {
    /// Fold one event into the tally
    pub fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Skipped { .. } => self.counts.skipped += 1,
            RunEvent::Downloaded { .. } => self.counts.downloaded += 1,
            RunEvent::Failed { .. } => self.counts.failed += 1,
            RunEvent::ChallengePending { .. } => self.challenges += 1,
            RunEvent::Started { .. } | RunEvent::Processing { .. } | RunEvent::Finished { .. } => {}
        }
    }

    /// Short form for the progress bar message
    pub fn message(&self) -> String {
        format!(
            "✅ {} new, {} present, ❌ {} failed",
            self.counts.downloaded, self.counts.skipped, self.counts.failed
        )
    }
}

/// Line printed for an event, if it deserves one
pub fn describe(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::Skipped { doi, bytes } => {
            Some(format!("⏭️  {} already downloaded ({} bytes)", doi, bytes))
        }
        RunEvent::Downloaded { doi, mirror, bytes } => {
            Some(format!("✅ {} ({} bytes from {})", doi, bytes, mirror))
        }
        RunEvent::Failed { doi } => Some(format!("❌ {} not available on any mirror", doi)),
        RunEvent::ChallengePending { doi, mirror } => Some(format!(
            "🤖 {} is showing a challenge for {}. Complete it in the browser window.",
            mirror, doi
        )),
        RunEvent::Finished { interrupted: true } => {
            Some("⏹️  Interrupted, stopping after cleanup".to_string())
        }
        RunEvent::Started { .. } | RunEvent::Processing { .. } | RunEvent::Finished { .. } => None,
    }
}

/// Background renderer for run events
pub struct ProgressDisplay {
    task: JoinHandle<Tally>,
}

impl ProgressDisplay {
    /// Start rendering events for a run over `total` identifiers
    ///
    /// The display ends when every sender of `events` is dropped.
    pub fn start(total: usize, quiet: bool, mut events: mpsc::UnboundedReceiver<RunEvent>) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        let text_mode = bar.is_hidden() && !quiet;

        let task = tokio::spawn(async move {
            let mut tally = Tally::default();

            while let Some(event) = events.recv().await {
                tally.apply(&event);

                if let RunEvent::Processing { doi, position } = &event {
                    bar.set_position(position.saturating_sub(1) as u64);
                    debug!("Processing {} ({}/{})", doi, position, total);
                }
                if matches!(
                    event,
                    RunEvent::Skipped { .. } | RunEvent::Downloaded { .. } | RunEvent::Failed { .. }
                ) {
                    bar.inc(1);
                }

                if let Some(line) = describe(&event) {
                    if text_mode {
                        eprintln!("{}", line);
                    } else if !quiet {
                        bar.println(line);
                    }
                }
                bar.set_message(tally.message());
            }

            bar.finish_and_clear();
            tally
        });

        Self { task }
    }

    /// Wait for the event stream to end and return the final tally
    pub async fn finish(self) -> Tally {
        self.task.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Doi;

    #[test]
    fn test_tally_counts_outcomes() {
        let mut tally = Tally::default();
        let doi = Doi::new("10.1/a");

        tally.apply(&RunEvent::Started { total: 3 });
        tally.apply(&RunEvent::Skipped {
            doi: doi.clone(),
            bytes: 5000,
        });
        tally.apply(&RunEvent::ChallengePending {
            doi: doi.clone(),
            mirror: "https://m1".to_string(),
        });
        tally.apply(&RunEvent::Downloaded {
            doi: doi.clone(),
            mirror: "https://m1".to_string(),
            bytes: 2000,
        });
        tally.apply(&RunEvent::Failed { doi });

        assert_eq!(tally.counts.processed(), 3);
        assert_eq!(tally.challenges, 1);
        assert!(tally.message().contains("1 new, 1 present"));
    }

    #[test]
    fn test_describe_events() {
        let doi = Doi::new("10.1/a");
        assert!(describe(&RunEvent::Failed { doi: doi.clone() })
            .unwrap()
            .contains("10.1/a"));
        assert!(describe(&RunEvent::Started { total: 1 }).is_none());
        assert!(describe(&RunEvent::Finished { interrupted: false }).is_none());
        assert!(describe(&RunEvent::Finished { interrupted: true }).is_some());
    }

    #[tokio::test]
    async fn test_display_returns_tally_when_senders_drop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let display = ProgressDisplay::start(1, true, rx);

        tx.send(RunEvent::Started { total: 1 }).unwrap();
        tx.send(RunEvent::Downloaded {
            doi: Doi::new("10.1/a"),
            mirror: "https://m1".to_string(),
            bytes: 1500,
        })
        .unwrap();
        drop(tx);

        let tally = display.finish().await;
        assert_eq!(tally.counts.downloaded, 1);
    }
}
