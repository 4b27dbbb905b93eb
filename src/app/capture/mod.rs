//! Payload capture
//!
//! Once a page shows downloadable content, the capturer tries an ordered list
//! of strategies to make the browser download the document and save it to the
//! target path:
//!
//! 1. [`ClickTrigger::save_control`] clicks the viewer's save button
//! 2. [`ClickTrigger::pdf_link`] clicks a link to a `.pdf` resource
//! 3. [`EmbeddedSource`] opens the embedded viewer's source in a separate page
//!
//! Strategies are independent: an error in one is logged and the next one
//! runs. A strategy only counts as successful when the saved file exists and
//! is larger than the minimum size.

pub mod strategies;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::app::models::valid_file_size;
use crate::app::session::{BrowserSession, SessionPage};
use crate::constants::{detection, timing};
use crate::errors::{CaptureError, CaptureResult};

pub use strategies::{resolve_reference, ClickTrigger, EmbeddedSource};

/// Everything a strategy needs for one capture attempt
pub struct CaptureContext<'a> {
    /// Session the page belongs to, for opening isolated pages
    pub session: &'a dyn BrowserSession,
    /// Page classified as ready
    pub page: &'a dyn SessionPage,
    /// Where the document must end up
    pub target: &'a Path,
    /// How long to wait for the browser download
    pub download_timeout: Duration,
}

/// One way of getting the document out of a ready page
#[async_trait]
pub trait CaptureStrategy: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Trigger a download and save it to `ctx.target`
    ///
    /// Returns `CaptureError::NotApplicable` when the page has nothing this
    /// strategy can act on.
    async fn attempt(&self, ctx: &CaptureContext<'_>) -> CaptureResult<()>;
}

/// Runs capture strategies in order until one produces a valid file
pub struct PayloadCapturer {
    strategies: Vec<Box<dyn CaptureStrategy>>,
    download_timeout: Duration,
    min_bytes: u64,
}

impl Default for PayloadCapturer {
    fn default() -> Self {
        Self::new(timing::DOWNLOAD_TIMEOUT, detection::MIN_PDF_BYTES)
    }
}

impl PayloadCapturer {
    /// Capturer with the standard strategy order
    pub fn new(download_timeout: Duration, min_bytes: u64) -> Self {
        Self::with_strategies(Self::default_strategies(), download_timeout, min_bytes)
    }

    /// Capturer with a custom strategy list
    pub fn with_strategies(
        strategies: Vec<Box<dyn CaptureStrategy>>,
        download_timeout: Duration,
        min_bytes: u64,
    ) -> Self {
        Self {
            strategies,
            download_timeout,
            min_bytes,
        }
    }

    /// Save control, then PDF link, then embedded source
    pub fn default_strategies() -> Vec<Box<dyn CaptureStrategy>> {
        vec![
            Box::new(ClickTrigger::save_control()),
            Box::new(ClickTrigger::pdf_link()),
            Box::new(EmbeddedSource),
        ]
    }

    /// Names of the configured strategies, in order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy until one leaves a valid file at `target`
    ///
    /// Returns the saved size, or `None` when every strategy failed. Never
    /// returns an error: failures are logged and the caller moves on.
    pub async fn capture(
        &self,
        session: &dyn BrowserSession,
        page: &dyn SessionPage,
        target: &Path,
    ) -> Option<u64> {
        let ctx = CaptureContext {
            session,
            page,
            target,
            download_timeout: self.download_timeout,
        };

        for strategy in &self.strategies {
            let result = match strategy.attempt(&ctx).await {
                Ok(()) => self.verify(target).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(bytes) => {
                    info!(
                        "Captured {} via {} ({} bytes)",
                        target.display(),
                        strategy.name(),
                        bytes
                    );
                    return Some(bytes);
                }
                Err(CaptureError::NotApplicable { what }) => {
                    debug!("Skipping {}: no {} on page", strategy.name(), what);
                }
                Err(e) => {
                    warn!("{} capture failed: {}", strategy.name(), e);
                }
            }
        }

        None
    }

    /// Check the saved file; an undersized file is removed
    async fn verify(&self, target: &Path) -> CaptureResult<u64> {
        if let Some(bytes) = valid_file_size(target, self.min_bytes) {
            return Ok(bytes);
        }

        let bytes = tokio::fs::metadata(target)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);
        if bytes > 0 {
            if let Err(e) = tokio::fs::remove_file(target).await {
                debug!("Could not remove undersized {}: {}", target.display(), e);
            }
        }

        Err(CaptureError::Undersized {
            bytes,
            min: self.min_bytes,
        })
    }
}
