//! Scripted browser session
//!
//! Replays canned page snapshots and downloads instead of driving a real
//! browser. Each URL gets a [`PageScript`]: a sequence of snapshots returned
//! on successive polls (the last one repeats) and the downloads that clicks or
//! navigations produce. The session records every page it opens, closes and
//! navigates so tests can assert on browser activity.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{BrowserSession, NativeDownload, SessionPage};
use crate::app::models::{ContentMarkers, PageSnapshot};
use crate::constants::selectors;
use crate::errors::{BrowserError, BrowserResult};

/// What a scripted download produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedDownload {
    /// A file of the given size
    Bytes(usize),
    /// The browser cancels the download
    Canceled,
    /// No download event ever fires
    Never,
}

/// Scripted behavior for one URL
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    snapshots: Vec<PageSnapshot>,
    downloads: HashMap<String, ScriptedDownload>,
    navigation_error: Option<String>,
}

impl PageScript {
    /// Empty script: the page never shows anything
    pub fn new() -> Self {
        Self::default()
    }

    /// Page whose title reports the document as unavailable
    pub fn unavailable() -> Self {
        Self::new().then_show(PageSnapshot::titled("Article not available"))
    }

    /// Page that shows a viewer with a save button right away
    pub fn ready_with_save_control(bytes: usize) -> Self {
        Self::new()
            .then_show(PageSnapshot {
                title: "Paper".to_string(),
                markers: ContentMarkers {
                    save_control: true,
                    ..Default::default()
                },
                ..Default::default()
            })
            .on_click(selectors::SAVE_CONTROL, ScriptedDownload::Bytes(bytes))
    }

    /// Append a snapshot to the poll sequence
    pub fn then_show(mut self, snapshot: PageSnapshot) -> Self {
        self.snapshots.push(snapshot);
        self
    }

    /// Download produced by clicking `selector`
    pub fn on_click(mut self, selector: &str, download: ScriptedDownload) -> Self {
        self.downloads.insert(selector.to_string(), download);
        self
    }

    /// Navigation to this URL fails
    pub fn fail_navigation(mut self, reason: impl Into<String>) -> Self {
        self.navigation_error = Some(reason.into());
        self
    }

    /// Download produced by navigating to this URL
    pub fn on_navigate(mut self, download: ScriptedDownload) -> Self {
        self.downloads.insert(NAVIGATION_KEY.to_string(), download);
        self
    }

    fn snapshot_at(&self, poll: usize) -> PageSnapshot {
        self.snapshots
            .get(poll)
            .or_else(|| self.snapshots.last())
            .cloned()
            .unwrap_or_default()
    }
}

const NAVIGATION_KEY: &str = "<navigate>";

#[derive(Debug, Default)]
struct ScriptState {
    routes: HashMap<String, PageScript>,
    visits: Vec<String>,
    clicks: Vec<String>,
    pages_opened: usize,
    pages_closed: usize,
    downloads_created: usize,
}

/// Browser session that replays [`PageScript`]s
#[derive(Debug, Clone)]
pub struct ScriptedSession {
    state: Arc<Mutex<ScriptState>>,
    staging_dir: PathBuf,
}

impl ScriptedSession {
    /// New session staging downloads in `staging_dir`
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState::default())),
            staging_dir: staging_dir.into(),
        }
    }

    /// Script the page served at `url`
    pub fn route(&self, url: impl Into<String>, script: PageScript) -> &Self {
        self.lock().routes.insert(url.into(), script);
        self
    }

    /// URLs navigated to, in order
    pub fn visits(&self) -> Vec<String> {
        self.lock().visits.clone()
    }

    /// Selectors clicked, in order
    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    /// Number of pages opened
    pub fn pages_opened(&self) -> usize {
        self.lock().pages_opened
    }

    /// Number of pages closed
    pub fn pages_closed(&self) -> usize {
        self.lock().pages_closed
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn script_for(&self, url: &str) -> PageScript {
        self.lock().routes.get(url).cloned().unwrap_or_default()
    }

    async fn produce(&self, download: ScriptedDownload, timeout: Duration) -> BrowserResult<NativeDownload> {
        match download {
            ScriptedDownload::Bytes(size) => {
                let guid = {
                    let mut state = self.lock();
                    state.downloads_created += 1;
                    format!("scripted-{}", state.downloads_created)
                };
                tokio::fs::create_dir_all(&self.staging_dir).await?;
                let staged_path = self.staging_dir.join(&guid);
                tokio::fs::write(&staged_path, vec![b'%'; size]).await?;
                Ok(NativeDownload {
                    guid,
                    suggested_filename: "document.pdf".to_string(),
                    staged_path,
                })
            }
            ScriptedDownload::Canceled => Err(BrowserError::DownloadCanceled {
                guid: "scripted".to_string(),
            }),
            ScriptedDownload::Never => Err(BrowserError::Timeout {
                operation: "download".to_string(),
                seconds: timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn open_page(&self) -> BrowserResult<Box<dyn SessionPage>> {
        self.lock().pages_opened += 1;
        Ok(Box::new(ScriptedPage {
            session: self.clone(),
            url: None,
            polls: AtomicUsize::new(0),
        }))
    }
}

/// A page of a [`ScriptedSession`]
#[derive(Debug)]
pub struct ScriptedPage {
    session: ScriptedSession,
    url: Option<String>,
    polls: AtomicUsize,
}

impl ScriptedPage {
    fn script(&self) -> PageScript {
        self.url
            .as_deref()
            .map(|url| self.session.script_for(url))
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionPage for ScriptedPage {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        self.session.lock().visits.push(url.to_string());
        if let Some(reason) = self.session.script_for(url).navigation_error {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason,
            });
        }
        self.url = Some(url.to_string());
        self.polls.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn snapshot(&self) -> BrowserResult<PageSnapshot> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script().snapshot_at(poll))
    }

    async fn current_url(&self) -> BrowserResult<String> {
        Ok(self.url.clone().unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn click_for_download(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> BrowserResult<NativeDownload> {
        self.session.lock().clicks.push(selector.to_string());
        let download = self.script().downloads.get(selector).cloned().ok_or_else(|| {
            BrowserError::ElementNotFound {
                selector: selector.to_string(),
            }
        })?;
        self.session.produce(download, timeout).await
    }

    async fn goto_for_download(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> BrowserResult<NativeDownload> {
        self.session.lock().visits.push(url.to_string());
        self.url = Some(url.to_string());
        let download = self
            .script()
            .downloads
            .get(NAVIGATION_KEY)
            .cloned()
            .unwrap_or(ScriptedDownload::Never);
        self.session.produce(download, timeout).await
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        self.session.lock().pages_closed += 1;
        Ok(())
    }
}
