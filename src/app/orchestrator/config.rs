//! Configuration for the per-identifier orchestrator
//!
//! Built once (from defaults, the config file and CLI flags) and handed to the
//! orchestrator at construction; nothing changes it during a run.

use std::time::Duration;

use crate::app::detector::TitleMarkers;
use crate::constants::{detection, mirrors, timing};

/// Runtime settings for fetching identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Mirror base URLs, tried in order
    pub mirrors: Vec<String>,
    /// Navigation timeout per page
    pub page_timeout: Duration,
    /// How long to wait for a browser download to finish
    pub download_timeout: Duration,
    /// Pause between content polls
    pub poll_interval: Duration,
    /// Total polling budget per page
    pub max_wait: Duration,
    /// Pause after a page is ready, before capture
    pub settle_delay: Duration,
    /// Pause between identifiers
    pub identifier_delay: Duration,
    /// Title fragments for challenge and unavailable pages
    pub markers: TitleMarkers,
    /// A file must be strictly larger than this to count as a document
    pub min_pdf_bytes: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mirrors: mirrors::DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            page_timeout: timing::PAGE_TIMEOUT,
            download_timeout: timing::DOWNLOAD_TIMEOUT,
            poll_interval: timing::POLL_INTERVAL,
            max_wait: timing::MAX_WAIT,
            settle_delay: timing::SETTLE_DELAY,
            identifier_delay: timing::IDENTIFIER_DELAY,
            markers: TitleMarkers::default(),
            min_pdf_bytes: detection::MIN_PDF_BYTES,
        }
    }
}

impl OrchestratorConfig {
    /// Replace the mirror list
    pub fn with_mirrors<I, S>(mut self, mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mirrors = mirrors.into_iter().map(Into::into).collect();
        self
    }

    /// Set the polling cadence and budget
    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    /// Set navigation and download timeouts
    pub fn with_timeouts(mut self, page_timeout: Duration, download_timeout: Duration) -> Self {
        self.page_timeout = page_timeout;
        self.download_timeout = download_timeout;
        self
    }

    /// Set the settle and inter-identifier delays
    pub fn with_delays(mut self, settle_delay: Duration, identifier_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self.identifier_delay = identifier_delay;
        self
    }

    pub fn with_markers(mut self, markers: TitleMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_min_pdf_bytes(mut self, min_pdf_bytes: u64) -> Self {
        self.min_pdf_bytes = min_pdf_bytes;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.mirrors.is_empty() {
            return Err("At least one mirror must be configured".to_string());
        }

        if let Some(bad) = self.mirrors.iter().find(|m| url::Url::parse(m).is_err()) {
            return Err(format!("Mirror is not a valid URL: {}", bad));
        }

        if self.page_timeout.is_zero() || self.download_timeout.is_zero() {
            return Err("Page and download timeouts cannot be zero".to_string());
        }

        if self.poll_interval.is_zero() {
            return Err("Poll interval cannot be zero".to_string());
        }

        if self.max_wait.is_zero() {
            return Err("Maximum wait cannot be zero".to_string());
        }

        if self.poll_interval > self.max_wait {
            return Err("Poll interval cannot exceed the maximum wait".to_string());
        }

        Ok(())
    }
}
