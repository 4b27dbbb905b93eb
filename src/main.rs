//! DOI Fetcher CLI application
//!
//! Command-line interface for fetching PDFs for a list of DOIs through a
//! browser session, with mirror fallback and resumable progress.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use doi_fetcher::cli::{
    handle_config, handle_fetch, handle_reset_failed, handle_status, Cli, Commands,
};
use doi_fetcher::config::AppConfig;
use doi_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.global.config.clone()).await;

    let configured_level = config.as_ref().ok().map(|c| c.logging.level.as_str());
    init_logging(&cli, configured_level);
    let config = config?;

    info!("DOI Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(args, config, cli.global.quiet).await
        }
        Commands::Status(args) => {
            info!("Executing status command");
            handle_status(args, config).await
        }
        Commands::ResetFailed => {
            info!("Executing reset-failed command");
            handle_reset_failed(config).await
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(args, config).await
        }
    }
}

/// Initialize logging from CLI flags, falling back to the configured level
fn init_logging(cli: &Cli, configured_level: Option<&str>) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .or_else(|| configured_level.map(str::to_string))
        .unwrap_or_else(|| doi_fetcher::constants::logging::DEFAULT_LOG_LEVEL.to_string());

    let mut filter = EnvFilter::from_default_env();
    match format!("doi_fetcher={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level '{}': {}", level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
