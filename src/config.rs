//! Configuration management for DOI Fetcher
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! config file, the `DOI_FETCHER_CHROME` environment variable and finally
//! command-line flags (applied by the CLI layer).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{LaunchOptions, OrchestratorConfig, TitleMarkers};
use crate::constants::{self, detection, env, files, logging, mirrors, timing};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Input, output and bookkeeping files
    pub paths: PathsConfig,
    /// Mirror endpoints
    pub mirrors: MirrorsConfig,
    /// Timeouts and delays
    pub timing: TimingConfig,
    /// Page classification settings
    pub detection: DetectionConfig,
    /// Browser launch settings
    pub browser: BrowserSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// File locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// CSV file with a `doi` column
    pub input: PathBuf,
    /// Where documents are saved
    pub output_dir: PathBuf,
    /// Progress ledger (JSON)
    pub ledger_file: PathBuf,
    /// Append-only run log
    pub run_log: PathBuf,
    /// Browser download staging directory (defaults to `{output_dir}/.staging`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(files::DEFAULT_INPUT_FILE),
            output_dir: PathBuf::from(files::DEFAULT_OUTPUT_DIR),
            ledger_file: PathBuf::from(files::DEFAULT_LEDGER_FILE),
            run_log: PathBuf::from(files::DEFAULT_RUN_LOG),
            staging_dir: None,
        }
    }
}

impl PathsConfig {
    /// Effective staging directory
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join(files::STAGING_DIR_NAME))
    }
}

/// Mirror endpoints, tried in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorsConfig {
    pub endpoints: Vec<String>,
}

impl Default for MirrorsConfig {
    fn default() -> Self {
        Self {
            endpoints: mirrors::DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Timeouts and delays, written as human-readable durations ("30s", "500ms")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    #[serde(with = "humantime_serde")]
    pub page_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub download_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub max_wait: Duration,
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub identifier_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_timeout: timing::PAGE_TIMEOUT,
            download_timeout: timing::DOWNLOAD_TIMEOUT,
            poll_interval: timing::POLL_INTERVAL,
            max_wait: timing::MAX_WAIT,
            settle_delay: timing::SETTLE_DELAY,
            identifier_delay: timing::IDENTIFIER_DELAY,
        }
    }
}

/// Page classification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Title fragment of challenge pages
    pub challenge_marker: String,
    /// Title fragment of "not available" pages
    pub unavailable_marker: String,
    /// Files must be strictly larger than this
    pub min_pdf_bytes: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            challenge_marker: detection::CHALLENGE_MARKER.to_string(),
            unavailable_marker: detection::UNAVAILABLE_MARKER.to_string(),
            min_pdf_bytes: detection::MIN_PDF_BYTES,
        }
    }
}

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a window
    pub headless: bool,
    /// Chrome/Chromium executable (searched for when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    /// Persistent browser profile directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to the orchestrator's runtime configuration
    pub fn to_runtime_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_mirrors(self.mirrors.endpoints.iter().cloned())
            .with_timeouts(self.timing.page_timeout, self.timing.download_timeout)
            .with_polling(self.timing.poll_interval, self.timing.max_wait)
            .with_delays(self.timing.settle_delay, self.timing.identifier_delay)
            .with_markers(TitleMarkers {
                challenge: self.detection.challenge_marker.clone(),
                unavailable: self.detection.unavailable_marker.clone(),
            })
            .with_min_pdf_bytes(self.detection.min_pdf_bytes)
    }

    /// Runtime configuration, rejected if invalid
    pub fn validated_runtime_config(&self) -> ConfigResult<OrchestratorConfig> {
        let runtime = self.to_runtime_config();
        runtime
            .validate()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "orchestrator".to_string(),
                reason,
            })?;
        Ok(runtime)
    }

    /// Browser launch options
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            executable: self.browser.executable.clone(),
            headless: self.browser.headless,
            user_data_dir: self.browser.user_data_dir.clone(),
            staging_dir: self.paths.staging_dir(),
            request_timeout: self.timing.page_timeout,
        }
    }

    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. Environment variables
    ///
    /// CLI arguments are applied afterwards by the command handlers.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let config_path = match config_file_override {
            Some(ref path) => Some(path.clone()),
            None => Self::find_config_file(),
        };

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading config from: {}", path.display());
                config = Self::load_from_file(&path).await?;
            } else if config_file_override.is_some() {
                return Err(ConfigError::NotFound { path });
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (`DOI_FETCHER_CHROME`)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(executable) = std::env::var(env::CHROME_EXECUTABLE) {
            if !executable.trim().is_empty() {
                debug!("Browser executable from {}: {}", env::CHROME_EXECUTABLE, executable);
                self.browser.executable = Some(PathBuf::from(executable.trim()));
            }
        }
    }

    /// Write a commented default configuration file
    ///
    /// Writes to `path`, or to the user config directory when `None`. An
    /// existing file is only replaced with `force`.
    pub async fn write_default(path: Option<PathBuf>, force: bool) -> ConfigResult<PathBuf> {
        let config_path = match path {
            Some(path) => path,
            None => Self::default_config_path().ok_or_else(|| ConfigError::InvalidValue {
                field: "config_dir".to_string(),
                reason: "Could not determine user config directory".to_string(),
            })?,
        };

        if config_path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                field: "path".to_string(),
                reason: format!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                ),
            });
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&config_path, Self::generate_default_config_content()).await?;
        info!("Wrote default configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Option<PathBuf> {
        let mut search_paths: Vec<PathBuf> = constants::config::LOCAL_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .collect();
        search_paths.extend(Self::default_config_path());

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        debug!("No config file found in standard locations");
        None
    }

    /// Get the default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(constants::config::CONFIG_DIR_NAME)
                .join(constants::config::CONFIG_FILE_NAME)
        })
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        let endpoints = mirrors::DEFAULT_MIRRORS
            .iter()
            .map(|m| format!("\"{}\"", m))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"# DOI Fetcher Configuration
# Every setting is optional; missing values fall back to these defaults.

[paths]
# CSV file with a "doi" column
input = "{input}"
# Where PDFs are saved as <sanitized doi>.pdf
output_dir = "{output}"
# Progress ledger, used to resume interrupted runs
ledger_file = "{ledger}"
# Append-only log of outcomes
run_log = "{run_log}"
# Browser download staging directory (default: <output_dir>/{staging})
# staging_dir = "{output}/{staging}"

[mirrors]
# Tried in order for every identifier
endpoints = [{endpoints}]

[timing]
page_timeout = "{page_timeout}"
download_timeout = "{download_timeout}"
# How often the page is checked for content, and for how long
poll_interval = "{poll_interval}"
max_wait = "{max_wait}"
# Pause before capturing a ready page
settle_delay = "{settle_delay}"
# Pause between identifiers
identifier_delay = "{identifier_delay}"

[detection]
# Case-insensitive title fragments
challenge_marker = "{challenge}"
unavailable_marker = "{unavailable}"
# Saved files must be larger than this many bytes
min_pdf_bytes = {min_bytes}

[browser]
# Keep the window visible so challenges can be completed by hand
headless = false
# Set here or with {env_var}; searched on PATH when unset
# executable = "/usr/bin/google-chrome"
# Reuse a profile so cleared challenges persist between runs
# user_data_dir = "browser-profile"

[logging]
level = "{level}"  # error, warn, info, debug, trace
"#,
            input = files::DEFAULT_INPUT_FILE,
            output = files::DEFAULT_OUTPUT_DIR,
            ledger = files::DEFAULT_LEDGER_FILE,
            run_log = files::DEFAULT_RUN_LOG,
            staging = files::STAGING_DIR_NAME,
            endpoints = endpoints,
            page_timeout = human(timing::PAGE_TIMEOUT),
            download_timeout = human(timing::DOWNLOAD_TIMEOUT),
            poll_interval = human(timing::POLL_INTERVAL),
            max_wait = human(timing::MAX_WAIT),
            settle_delay = human(timing::SETTLE_DELAY),
            identifier_delay = human(timing::IDENTIFIER_DELAY),
            challenge = detection::CHALLENGE_MARKER,
            unavailable = detection::UNAVAILABLE_MARKER,
            min_bytes = detection::MIN_PDF_BYTES,
            env_var = env::CHROME_EXECUTABLE,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}

fn human(duration: Duration) -> String {
    humantime_serde::re::humantime::format_duration(duration).to_string()
}
