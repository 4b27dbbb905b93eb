//! Data models for identifiers, page snapshots and fetch outcomes
//!
//! This module defines the core data structures shared by the detector,
//! capturer and orchestrator, along with the helpers that turn an identifier
//! into a mirror URL and a target file path.

use std::fmt;
use std::path::{Path, PathBuf};

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::constants::{files, selectors};

/// A document identifier (DOI)
///
/// Opaque: the only structure the fetcher relies on is that it can be
/// appended to a mirror URL and sanitized into a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Doi(String);

impl Doi {
    /// Create an identifier from any string-like value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the lookup URL for this identifier on a mirror
    pub fn mirror_url(&self, mirror: &str) -> String {
        format!("{}/{}", mirror.trim_end_matches('/'), self.0)
    }

    /// Filesystem-safe file stem for this identifier
    pub fn file_stem(&self) -> String {
        sanitize_filename(&self.0)
    }

    /// Target path for this identifier's document inside `output_dir`
    pub fn target_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}.{}", self.file_stem(), files::PDF_EXTENSION))
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Doi {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Doi {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Replace characters that are not allowed in file names and cap the length
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if files::DISALLOWED_FILENAME_CHARS.contains(&c) {
                files::FILENAME_REPLACEMENT
            } else {
                c
            }
        })
        .take(files::MAX_FILENAME_CHARS)
        .collect()
}

/// Size of `path` if it exists and is strictly larger than `min_bytes`
pub fn valid_file_size(path: &Path, min_bytes: u64) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .filter(|&len| len > min_bytes)
}

/// Count PDF files directly inside `dir` (0 if the directory does not exist)
pub fn count_pdfs(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(files::PDF_EXTENSION))
        })
        .count()
}

/// Classification of a page during content detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    /// Nothing recognizable yet
    Loading,
    /// An anti-bot challenge is waiting for the operator
    Challenge,
    /// The mirror reports the document as unavailable
    Unavailable,
    /// Downloadable content is present
    Ready,
    /// The wait budget ran out before a terminal classification
    TimedOut,
}

impl PageState {
    /// Whether polling stops in this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PageState::Unavailable | PageState::Ready | PageState::TimedOut
        )
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageState::Loading => "loading",
            PageState::Challenge => "challenge",
            PageState::Unavailable => "unavailable",
            PageState::Ready => "ready",
            PageState::TimedOut => "timed out",
        };
        f.write_str(name)
    }
}

/// Presence flags for the page elements that indicate downloadable content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentMarkers {
    pub embedded_pdf: bool,
    pub pdf_frame: bool,
    pub pdf_link: bool,
    pub save_control: bool,
}

impl ContentMarkers {
    /// Whether any content marker is present
    pub fn any(&self) -> bool {
        self.embedded_pdf || self.pdf_frame || self.pdf_link || self.save_control
    }
}

/// Point-in-time view of a page, enough to classify it and pick a capture strategy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    /// Document title
    pub title: String,
    /// Content presence flags
    pub markers: ContentMarkers,
    /// `src` of the embedded PDF element, if any
    pub embed_src: Option<String>,
    /// `src` of the PDF frame, if any
    pub frame_src: Option<String>,
}

impl PageSnapshot {
    /// Build a snapshot from a page title and its rendered HTML
    pub fn from_html(title: impl Into<String>, html: &str) -> Self {
        let document = Html::parse_document(html);

        let embed = select_first(&document, selectors::EMBEDDED_PDF);
        let frame = select_first(&document, selectors::PDF_FRAME);
        let source_frame = select_first(&document, selectors::PDF_SOURCE_FRAME);

        let markers = ContentMarkers {
            embedded_pdf: embed.is_some(),
            pdf_frame: frame.is_some(),
            pdf_link: select_first(&document, selectors::PDF_LINK).is_some(),
            save_control: select_first(&document, selectors::SAVE_CONTROL).is_some(),
        };

        Self {
            title: title.into(),
            markers,
            embed_src: embed.and_then(|e| non_empty_attr(e, "src")),
            frame_src: source_frame.and_then(|e| non_empty_attr(e, "src")),
        }
    }

    /// Snapshot with only a title (no content markers)
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Source reference for indirect capture: embedded element first, then frame
    pub fn source_reference(&self) -> Option<&str> {
        self.embed_src.as_deref().or(self.frame_src.as_deref())
    }
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn non_empty_attr(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Final outcome for one identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A valid file was already on disk; no browser activity happened
    AlreadyPresent { bytes: u64 },
    /// Captured from a mirror
    Downloaded { mirror: String, bytes: u64 },
    /// Every mirror was tried without success
    Failed { attempts: usize },
}

impl FetchOutcome {
    /// Whether the identifier ended up with a valid file
    pub fn is_success(&self) -> bool {
        !matches!(self, FetchOutcome::Failed { .. })
    }
}
