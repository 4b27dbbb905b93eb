//! Content detection for mirror pages
//!
//! A mirror page goes through a few visible phases: it may show an anti-bot
//! challenge that the operator has to clear, it may report the document as
//! unavailable, or it eventually exposes a PDF viewer, link or save button.
//! [`classify`] maps a single [`PageSnapshot`] to a [`PageState`];
//! [`ContentDetector`] polls a live page until the classification is terminal
//! or the wait budget runs out.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app::models::{PageSnapshot, PageState};
use crate::app::session::SessionPage;
use crate::constants::{detection, timing};

/// Title fragments that identify challenge and unavailable pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMarkers {
    pub challenge: String,
    pub unavailable: String,
}

impl Default for TitleMarkers {
    fn default() -> Self {
        Self {
            challenge: detection::CHALLENGE_MARKER.to_string(),
            unavailable: detection::UNAVAILABLE_MARKER.to_string(),
        }
    }
}

/// Classify a snapshot; the title checks take precedence over page content
pub fn classify(snapshot: &PageSnapshot, markers: &TitleMarkers) -> PageState {
    let title = snapshot.title.to_lowercase();

    if contains_marker(&title, &markers.challenge) {
        PageState::Challenge
    } else if contains_marker(&title, &markers.unavailable) {
        PageState::Unavailable
    } else if snapshot.markers.any() {
        PageState::Ready
    } else {
        PageState::Loading
    }
}

fn contains_marker(lowercase_title: &str, marker: &str) -> bool {
    !marker.is_empty() && lowercase_title.contains(&marker.to_lowercase())
}

/// Result of waiting on one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Final classification
    pub state: PageState,
    /// Whether a challenge was shown at any point
    pub challenge_seen: bool,
    /// Number of snapshots taken
    pub polls: u32,
    /// Time spent waiting
    pub elapsed: Duration,
}

/// Polls a page until it is ready, unavailable, or out of time
#[derive(Debug, Clone)]
pub struct ContentDetector {
    poll_interval: Duration,
    max_wait: Duration,
    markers: TitleMarkers,
}

impl Default for ContentDetector {
    fn default() -> Self {
        Self::new(timing::POLL_INTERVAL, timing::MAX_WAIT, TitleMarkers::default())
    }
}

impl ContentDetector {
    /// Create a detector with the given polling cadence, budget and markers
    pub fn new(poll_interval: Duration, max_wait: Duration, markers: TitleMarkers) -> Self {
        Self {
            poll_interval,
            max_wait,
            markers,
        }
    }

    /// Poll `page` until a terminal classification or the wait budget is spent
    ///
    /// `on_challenge` runs once, the first time a challenge is seen, so the
    /// caller can prompt the operator. Challenges do not shorten or extend the
    /// budget. Snapshot errors are treated as a page that is still loading.
    pub async fn wait_for_content<F>(&self, page: &dyn SessionPage, mut on_challenge: F) -> Detection
    where
        F: FnMut() + Send,
    {
        let start = Instant::now();
        let mut challenge_seen = false;
        let mut polls = 0u32;

        loop {
            if start.elapsed() >= self.max_wait {
                warn!(
                    "No content after {:?} ({} polls), giving up on this page",
                    self.max_wait, polls
                );
                return Detection {
                    state: PageState::TimedOut,
                    challenge_seen,
                    polls,
                    elapsed: start.elapsed(),
                };
            }

            polls += 1;
            let state = match page.snapshot().await {
                Ok(snapshot) => classify(&snapshot, &self.markers),
                Err(e) => {
                    debug!("Snapshot failed ({}): {}", e.category(), e);
                    PageState::Loading
                }
            };

            match state {
                PageState::Challenge => {
                    if !challenge_seen {
                        challenge_seen = true;
                        warn!("Challenge page shown, waiting for it to be completed in the browser");
                        on_challenge();
                    }
                }
                PageState::Unavailable | PageState::Ready => {
                    info!("Page classified as {} after {} polls", state, polls);
                    return Detection {
                        state,
                        challenge_seen,
                        polls,
                        elapsed: start.elapsed(),
                    };
                }
                PageState::Loading | PageState::TimedOut => {}
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
