//! Chromium-backed browser session using chromiumoxide.
//!
//! Downloads are routed through the DevTools `Browser.setDownloadBehavior`
//! command: the browser writes every download into the staging directory
//! under its GUID and reports progress events, which are turned into
//! [`NativeDownload`] handles.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{BrowserSession, NativeDownload, SessionPage};
use crate::app::models::PageSnapshot;
use crate::constants::{browser, env, timing};
use crate::errors::{BrowserError, BrowserResult};

/// Find a Chrome/Chromium executable.
///
/// Search order: `DOI_FETCHER_CHROME`, the system PATH, then the usual
/// install locations on macOS and Windows.
pub fn find_chrome() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env::CHROME_EXECUTABLE) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in browser::EXECUTABLE_CANDIDATES {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    let common = if cfg!(target_os = "macos") {
        Some(PathBuf::from(browser::MACOS_CHROME_PATH))
    } else if cfg!(windows) {
        Some(PathBuf::from(browser::WINDOWS_CHROME_PATH))
    } else {
        None
    };

    common.filter(|path| path.exists())
}

/// Use `explicit` if it exists, otherwise search with [`find_chrome`]
pub fn find_chrome_for(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .filter(|path| path.exists())
        .map(Path::to_path_buf)
        .or_else(find_chrome)
}

/// Options for launching the browser
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Explicit executable; searched with [`find_chrome`] when `None`
    pub executable: Option<PathBuf>,
    /// Run without a window (challenges cannot be cleared by hand)
    pub headless: bool,
    /// Persistent profile directory, so cleared challenges survive restarts
    pub user_data_dir: Option<PathBuf>,
    /// Directory the browser writes downloads into
    pub staging_dir: PathBuf,
    /// Timeout for individual DevTools requests
    pub request_timeout: Duration,
}

impl LaunchOptions {
    /// Headed browser with a fresh profile, staging downloads in `staging_dir`
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: None,
            headless: false,
            user_data_dir: None,
            staging_dir: staging_dir.into(),
            request_timeout: timing::PAGE_TIMEOUT,
        }
    }
}

/// A launched Chromium instance with downloads enabled.
pub struct ChromiumSession {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    staging_dir: PathBuf,
}

impl ChromiumSession {
    /// Launch the browser and route its downloads into the staging directory
    pub async fn launch(options: LaunchOptions) -> BrowserResult<Self> {
        let executable = find_chrome_for(options.executable.as_deref())
            .ok_or(BrowserError::ExecutableNotFound)?;

        tokio::fs::create_dir_all(&options.staging_dir).await?;
        let staging_dir = tokio::fs::canonicalize(&options.staging_dir).await?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&executable)
            .request_timeout(options.request_timeout)
            .arg("--ignore-certificate-errors")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        if !options.headless {
            builder = builder.with_head().viewport(None);
        }
        if let Some(dir) = &options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }

        let config = builder
            .build()
            .map_err(|reason| BrowserError::Launch { reason })?;

        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| BrowserError::Launch {
                    reason: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        let mut params = SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::AllowAndName);
        params.download_path = Some(staging_dir.to_string_lossy().into_owned());
        params.events_enabled = Some(true);
        browser.execute(params).await?;

        info!(
            "Browser started ({}), downloads staged in {}",
            executable.display(),
            staging_dir.display()
        );

        Ok(Self {
            browser: Arc::new(browser),
            handler,
            staging_dir,
        })
    }

    /// Directory the browser writes downloads into
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Close the browser and stop the protocol handler
    pub async fn shutdown(self) -> BrowserResult<()> {
        if let Ok(mut browser) = Arc::try_unwrap(self.browser) {
            browser.close().await?;
            let _ = browser.wait().await;
        }
        self.handler.abort();
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn open_page(&self) -> BrowserResult<Box<dyn SessionPage>> {
        let page = self.browser.new_page("about:blank").await?;

        Ok(Box::new(ChromiumPage {
            page,
            browser: Arc::clone(&self.browser),
            staging_dir: self.staging_dir.clone(),
        }))
    }
}

/// A single Chromium page.
pub struct ChromiumPage {
    page: Page,
    browser: Arc<Browser>,
    staging_dir: PathBuf,
}

impl ChromiumPage {
    /// Subscribe to download events before the triggering action runs
    async fn download_waiter(&self) -> BrowserResult<DownloadWaiter> {
        Ok(DownloadWaiter {
            begins: self
                .browser
                .event_listener::<EventDownloadWillBegin>()
                .await?,
            progress: self
                .browser
                .event_listener::<EventDownloadProgress>()
                .await?,
            staging_dir: self.staging_dir.clone(),
        })
    }
}

#[async_trait]
impl SessionPage for ChromiumPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> BrowserResult<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout {
                operation: format!("navigation to {url}"),
                seconds: timeout.as_secs(),
            }),
        }
    }

    async fn snapshot(&self) -> BrowserResult<PageSnapshot> {
        let title = self.page.get_title().await?.unwrap_or_default();
        let html = self.page.content().await?;
        Ok(PageSnapshot::from_html(title, &html))
    }

    async fn current_url(&self) -> BrowserResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn click_for_download(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> BrowserResult<NativeDownload> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound {
                selector: selector.to_string(),
            })?;

        let waiter = self.download_waiter().await?;
        element.click().await?;
        waiter.wait(timeout).await
    }

    async fn goto_for_download(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> BrowserResult<NativeDownload> {
        let waiter = self.download_waiter().await?;

        // A navigation that turns into a download is reported as aborted, so
        // its result is only logged.
        let page = self.page.clone();
        let target = url.to_string();
        let navigation = tokio::spawn(async move {
            if let Err(e) = page.goto(target).await {
                debug!("Download navigation ended: {}", e);
            }
        });

        let result = waiter.wait(timeout).await;
        navigation.abort();
        result
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        self.page.close().await?;
        Ok(())
    }
}

/// Pending download subscription
struct DownloadWaiter {
    begins: EventStream<EventDownloadWillBegin>,
    progress: EventStream<EventDownloadProgress>,
    staging_dir: PathBuf,
}

impl DownloadWaiter {
    /// Wait for the first download to begin and then complete
    async fn wait(mut self, timeout: Duration) -> BrowserResult<NativeDownload> {
        let seconds = timeout.as_secs();

        let completed = async move {
            let begin = self
                .begins
                .next()
                .await
                .ok_or(BrowserError::DownloadStreamClosed)?;
            debug!(
                "Download {} started: {} ({})",
                begin.guid, begin.suggested_filename, begin.url
            );

            while let Some(event) = self.progress.next().await {
                if event.guid != begin.guid {
                    continue;
                }
                match event.state {
                    DownloadProgressState::Completed => {
                        return Ok(NativeDownload {
                            guid: begin.guid.clone(),
                            suggested_filename: begin.suggested_filename.clone(),
                            staged_path: self.staging_dir.join(&begin.guid),
                        });
                    }
                    DownloadProgressState::Canceled => {
                        return Err(BrowserError::DownloadCanceled {
                            guid: begin.guid.clone(),
                        });
                    }
                    _ => {}
                }
            }

            Err(BrowserError::DownloadStreamClosed)
        };

        tokio::time::timeout(timeout, completed)
            .await
            .map_err(|_| BrowserError::Timeout {
                operation: "download".to_string(),
                seconds,
            })?
    }
}
