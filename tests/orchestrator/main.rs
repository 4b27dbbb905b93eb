//! Integration tests for the orchestrator
//!
//! These tests drive the orchestrator end to end against a scripted browser
//! session: real ledger and run-log files on disk, synthetic pages, and
//! staged downloads written by the scripted session.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

use doi_fetcher::app::models::{ContentMarkers, PageSnapshot};
use doi_fetcher::app::session::{PageScript, ScriptedDownload, ScriptedSession};
use doi_fetcher::app::{
    create_shutdown_channel, Doi, FetchOutcome, Orchestrator, OrchestratorConfig, ProgressLedger,
    RunEvent, RunLog,
};
use doi_fetcher::constants::selectors;

/// Test environment with temporary ledger, output and staging directories
struct Harness {
    temp_dir: TempDir,
    session: ScriptedSession,
}

impl Harness {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let session = ScriptedSession::new(temp_dir.path().join("staging"));
        Self { temp_dir, session }
    }

    fn ledger_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("download_progress.json")
    }

    fn output_dir(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("papers")
    }

    fn log_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("download_log.txt")
    }

    /// Orchestrator with fast polling and no delays
    fn orchestrator(&self, mirrors: &[&str]) -> Orchestrator {
        let config = OrchestratorConfig::default()
            .with_mirrors(mirrors.iter().copied())
            .with_polling(Duration::from_millis(1), Duration::from_millis(40))
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(1))
            .with_delays(Duration::ZERO, Duration::ZERO);

        Orchestrator::new(
            config,
            Arc::new(self.session.clone()),
            ProgressLedger::open(self.ledger_path()),
            self.output_dir(),
        )
        .with_run_log(RunLog::new(self.log_path()))
    }

    /// Reload the ledger from disk
    fn persisted_ledger(&self) -> ProgressLedger {
        ProgressLedger::open(self.ledger_path())
    }
}

fn viewer_with(markers: ContentMarkers) -> PageSnapshot {
    PageSnapshot {
        title: "Paper".to_string(),
        markers,
        ..Default::default()
    }
}

/// Test the basic scenario: a ready page with a successful capture
#[tokio::test]
async fn test_ready_page_is_downloaded() {
    let harness = Harness::new();
    harness
        .session
        .route("https://m1/10.1/a", PageScript::ready_with_save_control(2400));

    let mut orchestrator = harness.orchestrator(&["https://m1"]);
    let outcome = orchestrator.process(&Doi::new("10.1/a")).await.unwrap();

    assert_eq!(
        outcome,
        FetchOutcome::Downloaded {
            mirror: "https://m1".to_string(),
            bytes: 2400
        }
    );

    let ledger = harness.persisted_ledger();
    assert_eq!(ledger.data().downloaded, vec!["10.1/a".to_string()]);
    assert!(ledger.data().failed.is_empty());
    assert!(!ledger.is_processed(&Doi::new("10.1/b")));

    let target = harness.output_dir().join("10.1_a.pdf");
    assert!(std::fs::metadata(&target).unwrap().len() >= 1000);

    assert_eq!(harness.session.pages_opened(), harness.session.pages_closed());
}

/// Test that an existing valid file short-circuits without browser activity
#[tokio::test]
async fn test_existing_file_skips_browser() {
    let harness = Harness::new();
    std::fs::create_dir_all(harness.output_dir()).unwrap();
    std::fs::write(harness.output_dir().join("10.1_a.pdf"), vec![b'%'; 5000]).unwrap();

    let mut orchestrator = harness.orchestrator(&["https://m1"]);
    let outcome = orchestrator.process(&Doi::new("10.1/a")).await.unwrap();

    assert_eq!(outcome, FetchOutcome::AlreadyPresent { bytes: 5000 });
    assert_eq!(harness.session.pages_opened(), 0);
    assert!(harness.session.visits().is_empty());
    assert!(harness.persisted_ledger().is_downloaded(&Doi::new("10.1/a")));
}

/// Test that an undersized existing file does not count as present
#[tokio::test]
async fn test_undersized_existing_file_is_refetched() {
    let harness = Harness::new();
    std::fs::create_dir_all(harness.output_dir()).unwrap();
    std::fs::write(harness.output_dir().join("10.1_a.pdf"), vec![b'x'; 1000]).unwrap();
    harness
        .session
        .route("https://m1/10.1/a", PageScript::ready_with_save_control(3000));

    let mut orchestrator = harness.orchestrator(&["https://m1"]);
    let outcome = orchestrator.process(&Doi::new("10.1/a")).await.unwrap();

    assert!(matches!(outcome, FetchOutcome::Downloaded { bytes: 3000, .. }));
    assert_eq!(harness.session.pages_opened(), 1);
}

/// Test that an identifier unavailable everywhere is recorded as failed once
#[tokio::test]
async fn test_unavailable_on_every_mirror_fails() {
    let harness = Harness::new();
    harness
        .session
        .route("https://m1/10.1/x", PageScript::unavailable());
    harness
        .session
        .route("https://m2/10.1/x", PageScript::unavailable());

    let mut orchestrator = harness.orchestrator(&["https://m1", "https://m2"]);
    let outcome = assert_ok!(orchestrator.process(&Doi::new("10.1/x")).await);

    assert_eq!(outcome, FetchOutcome::Failed { attempts: 2 });
    assert_eq!(
        harness.session.visits(),
        vec!["https://m1/10.1/x".to_string(), "https://m2/10.1/x".to_string()]
    );

    let ledger = harness.persisted_ledger();
    assert_eq!(ledger.data().failed, vec!["10.1/x".to_string()]);
    assert!(!ledger.is_downloaded(&Doi::new("10.1/x")));

    let log = std::fs::read_to_string(harness.log_path()).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("failed: 10.1/x"));
}

/// Test fallback to the second mirror after the first is unavailable
#[tokio::test]
async fn test_second_mirror_after_unavailable() {
    let harness = Harness::new();
    harness
        .session
        .route("https://m1/10.1/a", PageScript::unavailable());
    harness
        .session
        .route("https://m2/10.1/a", PageScript::ready_with_save_control(1800));

    let mut orchestrator = harness.orchestrator(&["https://m1", "https://m2"]);
    let outcome = orchestrator.process(&Doi::new("10.1/a")).await.unwrap();

    assert!(matches!(outcome, FetchOutcome::Downloaded { ref mirror, .. } if mirror == "https://m2"));
    assert!(harness.persisted_ledger().is_downloaded(&Doi::new("10.1/a")));
    assert_eq!(harness.session.pages_opened(), 2);
    assert_eq!(harness.session.pages_closed(), 2);
}

/// Test fallback to the second mirror after a capture failure
#[tokio::test]
async fn test_second_mirror_after_capture_failure() {
    let harness = Harness::new();
    // Ready, but the only download it offers is too small
    harness
        .session
        .route("https://m1/10.1/a", PageScript::ready_with_save_control(200));
    harness
        .session
        .route("https://m2/10.1/a", PageScript::ready_with_save_control(1500));

    let mut orchestrator = harness.orchestrator(&["https://m1", "https://m2"]);
    let outcome = orchestrator.process(&Doi::new("10.1/a")).await.unwrap();

    assert!(matches!(outcome, FetchOutcome::Downloaded { bytes: 1500, .. }));
    let ledger = harness.persisted_ledger();
    assert!(ledger.is_downloaded(&Doi::new("10.1/a")));
    assert!(!ledger.is_failed(&Doi::new("10.1/a")));
}

/// Test that a page that never settles times out and fails
#[tokio::test]
async fn test_loading_page_times_out() {
    let harness = Harness::new();
    // Unrouted URLs show an empty page forever

    let mut orchestrator = harness.orchestrator(&["https://m1"]);
    let outcome = orchestrator.process(&Doi::new("10.1/slow")).await.unwrap();

    assert_eq!(outcome, FetchOutcome::Failed { attempts: 1 });
    assert_eq!(harness.session.pages_closed(), 1);
}

/// Test that a canceled click download falls back to the embedded source
#[tokio::test]
async fn test_embedded_source_used_after_click_fails() {
    let harness = Harness::new();
    let page = PageSnapshot {
        title: "Paper".to_string(),
        markers: ContentMarkers {
            save_control: true,
            embedded_pdf: true,
            ..Default::default()
        },
        embed_src: Some("//cdn.m1/files/a.pdf#view=FitH".to_string()),
        frame_src: None,
    };
    harness.session.route(
        "https://m1/10.1/a",
        PageScript::new()
            .then_show(page)
            .on_click(selectors::SAVE_CONTROL, ScriptedDownload::Canceled),
    );
    harness.session.route(
        "https://cdn.m1/files/a.pdf#view=FitH",
        PageScript::new().on_navigate(ScriptedDownload::Bytes(4096)),
    );

    let mut orchestrator = harness.orchestrator(&["https://m1"]);
    let outcome = orchestrator.process(&Doi::new("10.1/a")).await.unwrap();

    assert!(matches!(outcome, FetchOutcome::Downloaded { bytes: 4096, .. }));
    // Main page plus the isolated source page, both closed
    assert_eq!(harness.session.pages_opened(), 2);
    assert_eq!(harness.session.pages_closed(), 2);
    assert!(harness
        .session
        .visits()
        .contains(&"https://cdn.m1/files/a.pdf#view=FitH".to_string()));
}

/// Test that an undersized save falls through to the next strategy on the same page
#[tokio::test]
async fn test_undersized_save_falls_back_to_pdf_link() {
    let harness = Harness::new();
    harness.session.route(
        "https://m1/10.1/a",
        PageScript::new()
            .then_show(viewer_with(ContentMarkers {
                save_control: true,
                pdf_link: true,
                ..Default::default()
            }))
            .on_click(selectors::SAVE_CONTROL, ScriptedDownload::Bytes(10))
            .on_click(selectors::PDF_LINK, ScriptedDownload::Bytes(2000)),
    );

    let mut orchestrator = harness.orchestrator(&["https://m1"]);
    let outcome = assert_ok!(orchestrator.process(&Doi::new("10.1/a")).await);

    assert_eq!(
        outcome,
        FetchOutcome::Downloaded {
            mirror: "https://m1".to_string(),
            bytes: 2000
        }
    );
    assert_eq!(
        harness.session.clicks(),
        vec![
            selectors::SAVE_CONTROL.to_string(),
            selectors::PDF_LINK.to_string()
        ]
    );
    // One page, one file: the 10-byte save is gone
    assert_eq!(harness.session.pages_opened(), 1);
    let target = harness.output_dir().join("10.1_a.pdf");
    assert_eq!(std::fs::metadata(&target).unwrap().len(), 2000);
    assert_eq!(std::fs::read_dir(harness.output_dir()).unwrap().count(), 1);
}

/// Test that the isolated source page is closed when its download fails
#[tokio::test]
async fn test_embedded_source_page_closed_on_failure() {
    let harness = Harness::new();
    let page = PageSnapshot {
        title: "Paper".to_string(),
        markers: ContentMarkers {
            embedded_pdf: true,
            ..Default::default()
        },
        embed_src: Some("/f/a.pdf".to_string()),
        frame_src: None,
    };
    harness
        .session
        .route("https://m1/10.1/a", PageScript::new().then_show(page));
    harness.session.route(
        "https://m1/f/a.pdf",
        PageScript::new().on_navigate(ScriptedDownload::Canceled),
    );

    let mut orchestrator = harness.orchestrator(&["https://m1"]);
    let outcome = assert_ok!(orchestrator.process(&Doi::new("10.1/a")).await);

    assert_eq!(outcome, FetchOutcome::Failed { attempts: 1 });
    assert_eq!(
        harness.session.visits(),
        vec![
            "https://m1/10.1/a".to_string(),
            "https://m1/f/a.pdf".to_string()
        ]
    );
    assert_eq!(harness.session.pages_opened(), 2);
    assert_eq!(harness.session.pages_closed(), 2);
    assert!(!harness.output_dir().join("10.1_a.pdf").exists());
}

/// Test a challenge that clears before the wait budget runs out
#[tokio::test]
async fn test_challenge_cleared_by_operator() {
    let harness = Harness::new();
    harness.session.route(
        "https://m1/10.1/a",
        PageScript::new()
            .then_show(PageSnapshot::titled("Are you a robot?"))
            .then_show(PageSnapshot::titled("Are you a robot?"))
            .then_show(viewer_with(ContentMarkers {
                pdf_link: true,
                ..Default::default()
            }))
            .on_click(selectors::PDF_LINK, ScriptedDownload::Bytes(1200)),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut orchestrator = harness.orchestrator(&["https://m1"]).with_events(tx);
    let outcome = orchestrator.process(&Doi::new("10.1/a")).await.unwrap();
    assert!(outcome.is_success());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, RunEvent::ChallengePending { .. }))
            .count(),
        1
    );
    assert!(matches!(events.last(), Some(RunEvent::Downloaded { .. })));
}

/// Test a full run over mixed identifiers
#[tokio::test]
async fn test_run_summary_over_mixed_identifiers() {
    let harness = Harness::new();
    std::fs::create_dir_all(harness.output_dir()).unwrap();
    std::fs::write(harness.output_dir().join("10.1_old.pdf"), vec![b'%'; 5000]).unwrap();
    harness
        .session
        .route("https://m1/10.1/a", PageScript::ready_with_save_control(1500));
    harness
        .session
        .route("https://m1/10.1/b", PageScript::unavailable());

    let pending = vec![Doi::new("10.1/old"), Doi::new("10.1/a"), Doi::new("10.1/b")];
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut orchestrator = harness.orchestrator(&["https://m1"]).with_events(tx);

    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let summary = assert_ok!(orchestrator.run(&pending, shutdown_rx).await);

    assert!(!summary.interrupted);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.this_run.skipped, 1);
    assert_eq!(summary.this_run.downloaded, 1);
    assert_eq!(summary.this_run.failed, 1);
    assert_eq!(summary.ledger_downloaded, 2);
    assert_eq!(summary.ledger_failed, 1);
    assert_eq!(summary.pdf_files, 2);
    assert_eq!(summary.remaining(), 0);

    let mut saw_started = false;
    let mut saw_finished = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            RunEvent::Started { total } => {
                assert_eq!(total, 3);
                saw_started = true;
            }
            RunEvent::Finished { interrupted } => {
                assert!(!interrupted);
                saw_finished = true;
            }
            _ => {}
        }
    }
    assert!(saw_started && saw_finished);

    let log = std::fs::read_to_string(harness.log_path()).unwrap();
    assert_eq!(log.lines().count(), 3);
}

/// Test that a resumed run only sees identifiers the ledger has not resolved
#[tokio::test]
async fn test_resume_skips_resolved_identifiers() {
    let harness = Harness::new();
    harness
        .session
        .route("https://m1/10.1/a", PageScript::ready_with_save_control(1500));
    harness
        .session
        .route("https://m1/10.1/b", PageScript::unavailable());

    let all = vec![Doi::new("10.1/a"), Doi::new("10.1/b"), Doi::new("10.1/c")];
    {
        let mut orchestrator = harness.orchestrator(&["https://m1"]);
        orchestrator.process(&all[0]).await.unwrap();
        orchestrator.process(&all[1]).await.unwrap();
    }

    let ledger = harness.persisted_ledger();
    assert_eq!(ledger.pending(&all), vec![Doi::new("10.1/c")]);
}
