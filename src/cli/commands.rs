//! Command handlers for DOI Fetcher CLI
//!
//! This module implements the command handlers that connect CLI arguments
//! and configuration to the core application functionality.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::{
    count_pdfs, create_shutdown_channel, read_identifiers, ChromiumSession, Doi, Orchestrator,
    ProgressLedger, RunLog, SignalHandler,
};
use crate::cli::{
    confirm_start, show_startup_status, ConfigAction, ConfigArgs, FetchArgs, ProgressDisplay,
    StartupStatus, StatusArgs,
};
use crate::config::AppConfig;
use crate::errors::{AppError, BrowserError, Result};

/// Handle the fetch command
///
/// Reads identifiers, skips the ones the ledger already resolved, and runs
/// the orchestrator over the rest in a freshly launched browser.
pub async fn handle_fetch(args: FetchArgs, mut config: AppConfig, quiet: bool) -> Result<()> {
    args.validate().map_err(AppError::generic)?;
    apply_fetch_overrides(&mut config, &args);

    let runtime = config.validated_runtime_config()?;
    let dois = read_identifiers(&config.paths.input)?;
    let ledger = ProgressLedger::open(&config.paths.ledger_file);
    let pending = select_pending(&ledger, &dois, args.limit);
    info!(
        "{} DOI(s) in {}, {} pending",
        dois.len(),
        config.paths.input.display(),
        pending.len()
    );

    let status = StartupStatus::gather(&config, dois.len(), pending.len(), ledger.stats());
    if !quiet {
        show_startup_status(&status);
    }

    if pending.is_empty() {
        println!("All DOIs in {} are already resolved.", config.paths.input.display());
        return Ok(());
    }

    if args.dry_run {
        println!("Dry run: would fetch {} DOI(s):", pending.len());
        for doi in &pending {
            println!("  {} -> {}", doi, doi.target_path(&config.paths.output_dir).display());
        }
        return Ok(());
    }

    if !status.is_ready() {
        return Err(BrowserError::ExecutableNotFound.into());
    }

    if !args.yes {
        confirm_start(config.browser.headless)?;
    }

    let session = Arc::new(ChromiumSession::launch(config.launch_options()).await?);

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let signal_task = SignalHandler::new(shutdown_tx).setup();

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let display = ProgressDisplay::start(pending.len(), quiet, event_rx);

    let mut orchestrator = Orchestrator::new(
        runtime,
        session.clone(),
        ledger,
        config.paths.output_dir.clone(),
    )
    .with_run_log(RunLog::new(&config.paths.run_log))
    .with_events(event_tx);

    let result = orchestrator.run(&pending, shutdown_rx).await;

    // Dropping the orchestrator closes the event channel and releases the session
    drop(orchestrator);
    display.finish().await;
    signal_task.abort();

    match Arc::try_unwrap(session) {
        Ok(session) => {
            if let Err(e) = session.shutdown().await {
                warn!("Browser did not shut down cleanly: {}", e);
            }
        }
        Err(_) => warn!("Browser session still in use, leaving it to exit with the process"),
    }

    let summary = result?;
    println!();
    println!("{}", summary.report());

    match summary.halted {
        Some(reason) => Err(AppError::generic(format!("Run stopped early: {}", reason))),
        None => Ok(()),
    }
}

/// Handle the status command
pub async fn handle_status(args: StatusArgs, mut config: AppConfig) -> Result<()> {
    if let Some(input) = args.input {
        config.paths.input = input;
    }

    let ledger = ProgressLedger::open(&config.paths.ledger_file);
    let stats = ledger.stats();

    println!("📒 Ledger: {}", config.paths.ledger_file.display());
    println!("   Downloaded: {}", stats.downloaded);
    println!("   Failed: {}", stats.failed);
    if let Some(last_update) = ledger.last_update() {
        println!("   Last update: {}", last_update);
    }

    if config.paths.input.exists() {
        let dois = read_identifiers(&config.paths.input)?;
        let pending = ledger.pending(&dois);
        println!(
            "📄 Input: {} ({} DOIs, {} pending)",
            config.paths.input.display(),
            dois.len(),
            pending.len()
        );
    } else {
        println!("📄 Input: {} (not found)", config.paths.input.display());
    }

    println!(
        "📁 Output: {} ({} PDF files)",
        config.paths.output_dir.display(),
        count_pdfs(&config.paths.output_dir)
    );

    Ok(())
}

/// Handle the reset-failed command
pub async fn handle_reset_failed(config: AppConfig) -> Result<()> {
    let mut ledger = ProgressLedger::open(&config.paths.ledger_file);
    let cleared = ledger.reset_failed()?;

    if cleared == 0 {
        println!("No failed DOIs recorded in {}", config.paths.ledger_file.display());
    } else {
        println!("🗑️  Cleared {} failed DOI(s); they will be retried on the next run", cleared);
    }

    Ok(())
}

/// Handle configuration commands
pub async fn handle_config(args: ConfigArgs, config: AppConfig) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let written = AppConfig::write_default(path, force).await?;
            println!("📁 Created configuration file:");
            println!("   {}", written.display());
        }
        ConfigAction::Show => {
            match AppConfig::find_config_file() {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => println!("# No config file found, showing defaults"),
            }
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// Apply fetch flags on top of the loaded configuration
pub fn apply_fetch_overrides(config: &mut AppConfig, args: &FetchArgs) {
    if let Some(input) = &args.input {
        config.paths.input = input.clone();
    }
    if let Some(output) = &args.output {
        config.paths.output_dir = output.clone();
    }
    if !args.mirrors.is_empty() {
        config.mirrors.endpoints = args.mirrors.clone();
    }
    if args.headless {
        config.browser.headless = true;
    }
}

/// Identifiers the ledger has not resolved, in input order, capped at `limit`
pub fn select_pending(ledger: &ProgressLedger, dois: &[Doi], limit: Option<usize>) -> Vec<Doi> {
    let mut pending = ledger.pending(dois);
    if let Some(limit) = limit {
        pending.truncate(limit);
    }
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_fetch_overrides_replace_config_values() {
        let mut config = AppConfig::default();
        let args = FetchArgs {
            input: Some(PathBuf::from("mine.csv")),
            output: Some(PathBuf::from("out")),
            mirrors: vec!["https://m1".to_string()],
            headless: true,
            ..Default::default()
        };

        apply_fetch_overrides(&mut config, &args);

        assert_eq!(config.paths.input, PathBuf::from("mine.csv"));
        assert_eq!(config.paths.output_dir, PathBuf::from("out"));
        assert_eq!(config.paths.staging_dir(), PathBuf::from("out/.staging"));
        assert_eq!(config.mirrors.endpoints, vec!["https://m1"]);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_fetch_overrides_keep_config_without_flags() {
        let mut config = AppConfig::default();
        apply_fetch_overrides(&mut config, &FetchArgs::default());
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_select_pending_skips_resolved_and_limits() {
        let temp_dir = TempDir::new().unwrap();
        let mut ledger = ProgressLedger::open(temp_dir.path().join("progress.json"));
        ledger.mark_downloaded(&Doi::new("10.1/a")).unwrap();
        ledger.mark_failed(&Doi::new("10.1/b")).unwrap();

        let dois: Vec<Doi> = ["10.1/a", "10.1/b", "10.1/c", "10.1/d", "10.1/e"]
            .into_iter()
            .map(Doi::new)
            .collect();

        let pending = select_pending(&ledger, &dois, None);
        assert_eq!(pending, vec![Doi::new("10.1/c"), Doi::new("10.1/d"), Doi::new("10.1/e")]);

        let limited = select_pending(&ledger, &dois, Some(2));
        assert_eq!(limited, vec![Doi::new("10.1/c"), Doi::new("10.1/d")]);
    }

    #[tokio::test]
    async fn test_reset_failed_clears_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let ledger_path = temp_dir.path().join("progress.json");
        {
            let mut ledger = ProgressLedger::open(&ledger_path);
            ledger.mark_failed(&Doi::new("10.1/x")).unwrap();
        }

        let mut config = AppConfig::default();
        config.paths.ledger_file = ledger_path.clone();
        handle_reset_failed(config).await.unwrap();

        let ledger = ProgressLedger::open(&ledger_path);
        assert_eq!(ledger.stats().failed, 0);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_touch_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("dois.csv");
        std::fs::write(&input, "title,doi\nA,10.1/a\nB,10.1/b\n").unwrap();

        let mut config = AppConfig::default();
        config.paths.input = input;
        config.paths.ledger_file = temp_dir.path().join("progress.json");
        config.paths.output_dir = temp_dir.path().join("papers");

        let args = FetchArgs {
            dry_run: true,
            ..Default::default()
        };
        handle_fetch(args, config, true).await.unwrap();

        assert!(!temp_dir.path().join("progress.json").exists());
        assert!(!temp_dir.path().join("papers").exists());
    }
}
