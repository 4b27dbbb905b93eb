//! Capture strategies
//!
//! Two direct strategies click an element on the ready page; the indirect one
//! follows the embedded viewer's source in an isolated page of the same
//! session, so cookies from a cleared challenge still apply.

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use super::{CaptureContext, CaptureStrategy};
use crate::app::models::ContentMarkers;
use crate::constants::selectors;
use crate::errors::{CaptureError, CaptureResult};

/// Click an element and save the download it triggers
#[derive(Clone)]
pub struct ClickTrigger {
    name: &'static str,
    what: &'static str,
    selector: &'static str,
    present: fn(&ContentMarkers) -> bool,
}

impl ClickTrigger {
    /// Click the viewer's save button
    pub fn save_control() -> Self {
        Self {
            name: "save-control",
            what: "save control",
            selector: selectors::SAVE_CONTROL,
            present: |m| m.save_control,
        }
    }

    /// Click a link to a `.pdf` resource
    pub fn pdf_link() -> Self {
        Self {
            name: "pdf-link",
            what: "PDF link",
            selector: selectors::PDF_LINK,
            present: |m| m.pdf_link,
        }
    }
}

#[async_trait]
impl CaptureStrategy for ClickTrigger {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn attempt(&self, ctx: &CaptureContext<'_>) -> CaptureResult<()> {
        let snapshot = ctx.page.snapshot().await?;
        if !(self.present)(&snapshot.markers) {
            return Err(CaptureError::NotApplicable { what: self.what });
        }

        info!("Clicking {}...", self.what);
        let download = ctx
            .page
            .click_for_download(self.selector, ctx.download_timeout)
            .await?;
        download.save_as(ctx.target).await?;
        Ok(())
    }
}

/// Open the embedded viewer's source in an isolated page and save the download
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSource;

#[async_trait]
impl CaptureStrategy for EmbeddedSource {
    fn name(&self) -> &'static str {
        "embedded-source"
    }

    async fn attempt(&self, ctx: &CaptureContext<'_>) -> CaptureResult<()> {
        let snapshot = ctx.page.snapshot().await?;
        let reference = snapshot
            .source_reference()
            .ok_or(CaptureError::NotApplicable {
                what: "embedded PDF source",
            })?;

        let page_url = ctx.page.current_url().await?;
        let source_url = resolve_reference(&page_url, reference)?;
        info!("Opening embedded source {}", source_url);

        let mut isolated = ctx.session.open_page().await?;
        let outcome = async {
            let download = isolated
                .goto_for_download(&source_url, ctx.download_timeout)
                .await?;
            download.save_as(ctx.target).await?;
            Ok::<(), CaptureError>(())
        }
        .await;

        if let Err(e) = isolated.close().await {
            debug!("Closing isolated page failed: {}", e);
        }

        outcome
    }
}

/// Resolve a viewer source reference against the page it appeared on
///
/// Handles protocol-relative (`//host/path`) and root-relative (`/path`)
/// references as well as plain relative ones. Absolute references are
/// returned unchanged.
pub fn resolve_reference(page_url: &str, reference: &str) -> CaptureResult<String> {
    let reference = reference.trim();
    let invalid = || CaptureError::InvalidReference {
        reference: reference.to_string(),
    };

    match Url::parse(page_url) {
        Ok(base) if !base.cannot_be_a_base() => base
            .join(reference)
            .map(String::from)
            .map_err(|_| invalid()),
        _ if reference.starts_with("//") => Ok(format!("https:{reference}")),
        _ => Url::parse(reference).map(String::from).map_err(|_| invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_protocol_relative() {
        let url = resolve_reference("https://m1/10.1/a", "//cdn.m1/pdf/a.pdf#view=FitH").unwrap();
        assert_eq!(url, "https://cdn.m1/pdf/a.pdf#view=FitH");

        let url = resolve_reference("http://m1/10.1/a", "//cdn.m1/a.pdf").unwrap();
        assert_eq!(url, "http://cdn.m1/a.pdf");
    }

    #[test]
    fn test_resolve_root_relative() {
        let url = resolve_reference("https://m1.example/10.1/a", "/downloads/a.pdf").unwrap();
        assert_eq!(url, "https://m1.example/downloads/a.pdf");
    }

    #[test]
    fn test_resolve_absolute_unchanged() {
        let url = resolve_reference("https://m1/x", "https://other.org/a.pdf").unwrap();
        assert_eq!(url, "https://other.org/a.pdf");
    }

    #[test]
    fn test_resolve_without_usable_page_url() {
        let url = resolve_reference("about:blank", "//cdn.m1/a.pdf").unwrap();
        assert_eq!(url, "https://cdn.m1/a.pdf");

        assert!(resolve_reference("about:blank", "/a.pdf").is_err());
    }

    #[test]
    fn test_click_trigger_names() {
        assert_eq!(ClickTrigger::save_control().name(), "save-control");
        assert_eq!(ClickTrigger::pdf_link().name(), "pdf-link");
        assert_eq!(EmbeddedSource.name(), "embedded-source");
    }
}
