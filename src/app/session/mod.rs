//! Browser session abstraction
//!
//! Defines the `BrowserSession` and `SessionPage` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The detector,
//! capturer and orchestrator only ever talk to these traits, so they can be
//! driven by a scripted session in tests.

pub mod chromium;
#[doc(hidden)]
pub mod scripted;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::app::models::PageSnapshot;
use crate::errors::BrowserResult;

pub use chromium::{find_chrome, find_chrome_for, ChromiumSession, LaunchOptions};
pub use scripted::{PageScript, ScriptedDownload, ScriptedSession};

/// A browser context that can open pages
///
/// All pages opened from one session share cookies and storage, so an
/// isolated page sees whatever the operator cleared on another page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Open a new blank page (tab) in this session
    async fn open_page(&self) -> BrowserResult<Box<dyn SessionPage>>;
}

/// A single page (tab) in a browser session
#[async_trait]
pub trait SessionPage: Send + Sync {
    /// Navigate to `url`, failing if the page does not load within `timeout`
    async fn goto(&mut self, url: &str, timeout: Duration) -> BrowserResult<()>;

    /// Capture the current title and content markers
    async fn snapshot(&self) -> BrowserResult<PageSnapshot>;

    /// Current page URL
    async fn current_url(&self) -> BrowserResult<String>;

    /// Click the first element matching `selector` and wait for the native
    /// download it triggers
    async fn click_for_download(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> BrowserResult<NativeDownload>;

    /// Navigate to `url` and wait for the native download it triggers
    async fn goto_for_download(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> BrowserResult<NativeDownload>;

    /// Close the page
    async fn close(self: Box<Self>) -> BrowserResult<()>;
}

/// A completed browser download, staged on disk until saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeDownload {
    /// Browser-assigned download id
    pub guid: String,
    /// File name suggested by the server
    pub suggested_filename: String,
    /// Where the browser wrote the file
    pub staged_path: PathBuf,
}

impl NativeDownload {
    /// Move the staged file to `target`, replacing any existing file
    ///
    /// Falls back to copy-and-remove when the staging directory lives on a
    /// different filesystem.
    pub async fn save_as(&self, target: &Path) -> BrowserResult<u64> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if tokio::fs::rename(&self.staged_path, target).await.is_err() {
            if let Err(e) = tokio::fs::copy(&self.staged_path, target).await {
                // A partial copy must not pass as an existing download later
                if let Err(cleanup) = tokio::fs::remove_file(target).await {
                    debug!("Could not remove partial {}: {}", target.display(), cleanup);
                }
                return Err(e.into());
            }
            if let Err(e) = tokio::fs::remove_file(&self.staged_path).await {
                debug!(
                    "Could not remove staged download {}: {}",
                    self.staged_path.display(),
                    e
                );
            }
        }

        let bytes = tokio::fs::metadata(target).await?.len();
        debug!(
            "Saved download {} ({}) to {} [{} bytes]",
            self.guid,
            self.suggested_filename,
            target.display(),
            bytes
        );
        Ok(bytes)
    }
}
