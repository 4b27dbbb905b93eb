//! Per-identifier orchestration
//!
//! The orchestrator drives one identifier at a time through the mirrors:
//! open a fresh page, navigate, wait for the detector to classify the page,
//! and hand ready pages to the capturer. Every identifier ends with exactly
//! one ledger update and one run-log line.
//!
//! # Architecture
//!
//! - [`config`] - Immutable runtime settings and validation
//! - [`stats`] - Run events and the final summary
//! - [`signals`] - Ctrl+C / SIGTERM handling for graceful shutdown
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use doi_fetcher::app::{
//!     create_shutdown_channel, ChromiumSession, Doi, LaunchOptions, Orchestrator,
//!     OrchestratorConfig, ProgressLedger,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Arc::new(ChromiumSession::launch(LaunchOptions::new("papers/.staging")).await?);
//! let ledger = ProgressLedger::open("download_progress.json");
//! let mut orchestrator =
//!     Orchestrator::new(OrchestratorConfig::default(), session, ledger, "papers");
//!
//! let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
//! let summary = orchestrator.run(&[Doi::new("10.1000/xyz")], shutdown_rx).await?;
//! println!("{}", summary.report());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod signals;
pub mod stats;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::app::capture::PayloadCapturer;
use crate::app::detector::ContentDetector;
use crate::app::ledger::ProgressLedger;
use crate::app::models::{count_pdfs, valid_file_size, Doi, FetchOutcome, PageState};
use crate::app::run_log::{LogOutcome, RunLog};
use crate::app::session::{BrowserSession, SessionPage};
use crate::errors::{BrowserResult, Result};

pub use config::OrchestratorConfig;
pub use signals::{create_shutdown_channel, SignalHandler};
pub use stats::{format_duration, RunCounts, RunEvent, RunSummary};

/// Fetches identifiers through a browser session and records the outcomes
pub struct Orchestrator {
    config: OrchestratorConfig,
    session: Arc<dyn BrowserSession>,
    ledger: ProgressLedger,
    output_dir: PathBuf,
    detector: ContentDetector,
    capturer: PayloadCapturer,
    run_log: Option<RunLog>,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl Orchestrator {
    /// Create an orchestrator writing documents into `output_dir`
    pub fn new(
        config: OrchestratorConfig,
        session: Arc<dyn BrowserSession>,
        ledger: ProgressLedger,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let detector = ContentDetector::new(
            config.poll_interval,
            config.max_wait,
            config.markers.clone(),
        );
        let capturer = PayloadCapturer::new(config.download_timeout, config.min_pdf_bytes);

        Self {
            config,
            session,
            ledger,
            output_dir: output_dir.into(),
            detector,
            capturer,
            run_log: None,
            events: None,
        }
    }

    /// Append outcome lines to a run log
    pub fn with_run_log(mut self, run_log: RunLog) -> Self {
        self.run_log = Some(run_log);
        self
    }

    /// Send progress events to `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the capturer (custom strategy list)
    pub fn with_capturer(mut self, capturer: PayloadCapturer) -> Self {
        self.capturer = capturer;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Give back the ledger, e.g. to report on it after a run
    pub fn into_ledger(self) -> ProgressLedger {
        self.ledger
    }

    /// Fetch one identifier, trying each mirror in order
    ///
    /// A valid file already at the target path short-circuits without any
    /// browser activity. Browser failures are contained per mirror; only
    /// ledger persistence errors are returned.
    pub async fn process(&mut self, doi: &Doi) -> Result<FetchOutcome> {
        let target = doi.target_path(&self.output_dir);

        if let Some(bytes) = valid_file_size(&target, self.config.min_pdf_bytes) {
            info!("{} already present ({} bytes)", doi, bytes);
            self.ledger.mark_downloaded(doi)?;
            self.log_outcome(doi, LogOutcome::Downloaded);
            self.emit(RunEvent::Skipped {
                doi: doi.clone(),
                bytes,
            });
            return Ok(FetchOutcome::AlreadyPresent { bytes });
        }

        for mirror in &self.config.mirrors {
            match self.attempt_mirror(doi, mirror, &target).await {
                Ok(Some(bytes)) => {
                    info!("Downloaded {} from {} ({} bytes)", doi, mirror, bytes);
                    self.ledger.mark_downloaded(doi)?;
                    self.log_outcome(doi, LogOutcome::Downloaded);
                    self.emit(RunEvent::Downloaded {
                        doi: doi.clone(),
                        mirror: mirror.clone(),
                        bytes,
                    });
                    return Ok(FetchOutcome::Downloaded {
                        mirror: mirror.clone(),
                        bytes,
                    });
                }
                Ok(None) => {
                    debug!("No document for {} on {}, trying next mirror", doi, mirror);
                }
                Err(e) => {
                    warn!("{} on {} failed ({}): {}", doi, mirror, e.category(), e);
                }
            }
        }

        let attempts = self.config.mirrors.len();
        warn!("Failed to fetch {} from {} mirror(s)", doi, attempts);
        self.ledger.mark_failed(doi)?;
        self.log_outcome(doi, LogOutcome::Failed);
        self.emit(RunEvent::Failed { doi: doi.clone() });
        Ok(FetchOutcome::Failed { attempts })
    }

    /// Process `pending` in order until done or shutdown is requested
    ///
    /// Shutdown aborts the identifier in flight without recording it. A ledger
    /// write failure stops the run; the summary carries the error in `halted`.
    pub async fn run(
        &mut self,
        pending: &[Doi],
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<RunSummary> {
        let started_at = Local::now();
        let start = Instant::now();
        tokio::fs::create_dir_all(&self.output_dir).await?;

        info!("Starting run over {} identifier(s)", pending.len());
        self.emit(RunEvent::Started {
            total: pending.len(),
        });

        let mut counts = RunCounts::default();
        let mut interrupted = false;
        let mut halted = None;

        for (index, doi) in pending.iter().enumerate() {
            if index > 0 && !self.config.identifier_delay.is_zero() {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown) => {
                        interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.config.identifier_delay) => {}
                }
            }

            self.emit(RunEvent::Processing {
                doi: doi.clone(),
                position: index + 1,
            });

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    interrupted = true;
                    break;
                }
                outcome = self.process(doi) => {
                    match outcome {
                        Ok(FetchOutcome::AlreadyPresent { .. }) => counts.skipped += 1,
                        Ok(FetchOutcome::Downloaded { .. }) => counts.downloaded += 1,
                        Ok(FetchOutcome::Failed { .. }) => counts.failed += 1,
                        Err(e) => {
                            error!("Stopping run at {}: {}", doi, e);
                            halted = Some(e.to_string());
                            break;
                        }
                    }
                }
            }
        }

        if interrupted {
            warn!("Run interrupted after {} identifier(s)", counts.processed());
        }
        self.emit(RunEvent::Finished { interrupted });

        let stats = self.ledger.stats();
        Ok(RunSummary {
            total: pending.len(),
            this_run: counts,
            ledger_downloaded: stats.downloaded,
            ledger_failed: stats.failed,
            pdf_files: count_pdfs(&self.output_dir),
            interrupted,
            halted,
            started_at,
            duration: start.elapsed(),
        })
    }

    /// One mirror attempt on a fresh page; the page is closed in every case
    async fn attempt_mirror(&self, doi: &Doi, mirror: &str, target: &Path) -> BrowserResult<Option<u64>> {
        let mut page = self.session.open_page().await?;
        let result = self.drive_page(page.as_mut(), doi, mirror, target).await;

        if let Err(e) = page.close().await {
            debug!("Closing page failed: {}", e);
        }

        result
    }

    async fn drive_page(
        &self,
        page: &mut dyn SessionPage,
        doi: &Doi,
        mirror: &str,
        target: &Path,
    ) -> BrowserResult<Option<u64>> {
        let url = doi.mirror_url(mirror);
        info!("Opening {}", url);
        page.goto(&url, self.config.page_timeout).await?;

        let detection = self
            .detector
            .wait_for_content(&*page, || {
                self.emit(RunEvent::ChallengePending {
                    doi: doi.clone(),
                    mirror: mirror.to_string(),
                })
            })
            .await;

        match detection.state {
            PageState::Ready => {
                tokio::time::sleep(self.config.settle_delay).await;
                Ok(self.capturer.capture(self.session.as_ref(), &*page, target).await)
            }
            PageState::Unavailable => {
                info!("{} reports {} as not available", mirror, doi);
                Ok(None)
            }
            state => {
                warn!("{} on {} ended as {}", doi, mirror, state);
                Ok(None)
            }
        }
    }

    fn log_outcome(&self, doi: &Doi, outcome: LogOutcome) {
        if let Some(run_log) = &self.run_log {
            run_log.record(doi, outcome);
        }
    }

    fn emit(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Resolves once shutdown is requested; a closed channel never resolves
async fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) {
    match shutdown.recv().await {
        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
        Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{ContentMarkers, PageSnapshot};
    use crate::app::session::{PageScript, ScriptedDownload, ScriptedSession};
    use crate::constants::selectors;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast_config(mirrors: &[&str]) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_mirrors(mirrors.iter().copied())
            .with_polling(Duration::from_millis(1), Duration::from_millis(30))
            .with_delays(Duration::ZERO, Duration::ZERO)
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(1))
    }

    fn orchestrator(temp_dir: &TempDir, session: &ScriptedSession, mirrors: &[&str]) -> Orchestrator {
        let ledger = ProgressLedger::open(temp_dir.path().join("progress.json"));
        Orchestrator::new(
            fast_config(mirrors),
            Arc::new(session.clone()),
            ledger,
            temp_dir.path().join("papers"),
        )
    }

    /// Test that a challenge emits one pending event and the page still completes
    #[tokio::test]
    async fn test_challenge_then_ready_emits_event_once() {
        let temp_dir = TempDir::new().unwrap();
        let session = ScriptedSession::new(temp_dir.path().join("staging"));
        let viewer = PageSnapshot {
            title: "Paper".to_string(),
            markers: ContentMarkers {
                save_control: true,
                ..Default::default()
            },
            ..Default::default()
        };
        session.route(
            "https://m1/10.1/a",
            PageScript::new()
                .then_show(PageSnapshot::titled("Are you a robot?"))
                .then_show(PageSnapshot::titled("Are you a robot?"))
                .then_show(viewer)
                .on_click(selectors::SAVE_CONTROL, ScriptedDownload::Bytes(2000)),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut orchestrator = orchestrator(&temp_dir, &session, &["https://m1"]).with_events(tx);

        let outcome = orchestrator.process(&Doi::new("10.1/a")).await.unwrap();
        assert!(outcome.is_success());

        let mut challenges = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, RunEvent::ChallengePending { .. }) {
                challenges += 1;
            }
        }
        assert_eq!(challenges, 1);
    }

    /// Test that a navigation error moves on to the next mirror
    #[tokio::test]
    async fn test_navigation_error_falls_through() {
        let temp_dir = TempDir::new().unwrap();
        let session = ScriptedSession::new(temp_dir.path().join("staging"));
        session.route(
            "https://m1/10.1/a",
            PageScript::new().fail_navigation("net::ERR_CONNECTION_RESET"),
        );
        session.route("https://m2/10.1/a", PageScript::ready_with_save_control(1500));

        let mut orchestrator = orchestrator(&temp_dir, &session, &["https://m1", "https://m2"]);
        let outcome = orchestrator.process(&Doi::new("10.1/a")).await.unwrap();

        assert_eq!(
            outcome,
            FetchOutcome::Downloaded {
                mirror: "https://m2".to_string(),
                bytes: 1500
            }
        );
        assert_eq!(session.pages_opened(), session.pages_closed());
    }

    /// Test that a ledger write failure stops the run but still yields a summary
    #[tokio::test]
    async fn test_ledger_failure_halts_run_with_summary() {
        let temp_dir = TempDir::new().unwrap();
        let session = ScriptedSession::new(temp_dir.path().join("staging"));

        // The ledger's parent is a regular file, so every persist fails
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let output_dir = temp_dir.path().join("papers");
        std::fs::create_dir_all(&output_dir).unwrap();
        std::fs::write(output_dir.join("10.1_a.pdf"), vec![b'%'; 5000]).unwrap();

        let mut orchestrator = Orchestrator::new(
            fast_config(&["https://m1"]),
            Arc::new(session.clone()),
            ProgressLedger::open(blocker.join("progress.json")),
            &output_dir,
        );

        let (_tx, rx) = create_shutdown_channel();
        let summary = orchestrator
            .run(&[Doi::new("10.1/a"), Doi::new("10.1/b")], rx)
            .await
            .unwrap();

        assert!(summary.halted.is_some());
        assert!(!summary.interrupted);
        assert_eq!(summary.this_run.processed(), 0);
        assert_eq!(summary.remaining(), 2);
        assert_eq!(summary.pdf_files, 1);
        assert_eq!(session.pages_opened(), 0);
        assert!(summary.report().contains("Stopped by:"));
    }

    /// Test that shutdown before the first identifier records nothing
    #[tokio::test]
    async fn test_run_interrupted_before_start() {
        let temp_dir = TempDir::new().unwrap();
        let session = ScriptedSession::new(temp_dir.path().join("staging"));
        let mut orchestrator = orchestrator(&temp_dir, &session, &["https://m1"]);

        let (tx, rx) = create_shutdown_channel();
        tx.send(()).unwrap();

        let summary = orchestrator
            .run(&[Doi::new("10.1/a"), Doi::new("10.1/b")], rx)
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.this_run.processed(), 0);
        assert_eq!(summary.remaining(), 2);
        assert_eq!(orchestrator.ledger().stats().total(), 0);
    }
}
