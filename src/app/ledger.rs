//! Persistent progress ledger
//!
//! Records which identifiers have been resolved, either downloaded or failed,
//! so that an interrupted run can resume where it stopped. The ledger is
//! rewritten in full after every mutation; a missing or corrupt file on load
//! is treated as an empty ledger.
//!
//! An identifier is in at most one of the two sets. A successful download
//! always wins: `mark_downloaded` moves an identifier out of the failed set,
//! while `mark_failed` never touches an identifier that is already recorded.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::models::Doi;
use crate::constants::files;
use crate::errors::{LedgerError, LedgerResult};

/// On-disk layout of the ledger file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerData {
    #[serde(default)]
    pub downloaded: Vec<String>,
    #[serde(default)]
    pub failed: Vec<String>,
    #[serde(default)]
    pub last_update: Option<String>,
}

/// Counts of resolved identifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub downloaded: usize,
    pub failed: usize,
}

impl LedgerStats {
    /// Total resolved identifiers
    pub fn total(&self) -> usize {
        self.downloaded + self.failed
    }
}

/// Progress ledger backed by a JSON file
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    data: LedgerData,
}

impl ProgressLedger {
    /// Open the ledger at `path`, starting empty if it is missing or unreadable
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = Self::load(&path);

        if !data.downloaded.is_empty() || !data.failed.is_empty() {
            info!(
                "Loaded progress from {}: {} downloaded, {} failed",
                path.display(),
                data.downloaded.len(),
                data.failed.len()
            );
        }

        Self { path, data }
    }

    fn load(path: &Path) -> LedgerData {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No progress ledger at {}, starting empty", path.display());
                return LedgerData::default();
            }
            Err(e) => {
                warn!(
                    "Could not read progress ledger {}: {}. Starting empty",
                    path.display(),
                    e
                );
                return LedgerData::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    "Progress ledger {} is corrupt ({}). Starting empty",
                    path.display(),
                    e
                );
                LedgerData::default()
            }
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timestamp of the last persisted mutation
    pub fn last_update(&self) -> Option<&str> {
        self.data.last_update.as_deref()
    }

    /// Current ledger contents
    pub fn data(&self) -> &LedgerData {
        &self.data
    }

    /// Whether the identifier has been downloaded or has failed
    pub fn is_processed(&self, doi: &Doi) -> bool {
        self.is_downloaded(doi) || self.is_failed(doi)
    }

    /// Whether the identifier is recorded as downloaded
    pub fn is_downloaded(&self, doi: &Doi) -> bool {
        self.data.downloaded.iter().any(|d| d == doi.as_str())
    }

    /// Whether the identifier is recorded as failed
    pub fn is_failed(&self, doi: &Doi) -> bool {
        self.data.failed.iter().any(|d| d == doi.as_str())
    }

    /// Record a successful download, clearing any earlier failure
    pub fn mark_downloaded(&mut self, doi: &Doi) -> LedgerResult<()> {
        if !self.is_downloaded(doi) {
            self.data.downloaded.push(doi.as_str().to_string());
        }
        self.data.failed.retain(|d| d != doi.as_str());
        self.persist()
    }

    /// Record a failure unless the identifier is already resolved
    pub fn mark_failed(&mut self, doi: &Doi) -> LedgerResult<()> {
        if !self.is_processed(doi) {
            self.data.failed.push(doi.as_str().to_string());
        }
        self.persist()
    }

    /// Forget all failures so those identifiers are retried; returns how many were cleared
    pub fn reset_failed(&mut self) -> LedgerResult<usize> {
        let cleared = self.data.failed.len();
        self.data.failed.clear();
        self.persist()?;
        Ok(cleared)
    }

    /// Counts of downloaded and failed identifiers
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            downloaded: self.data.downloaded.len(),
            failed: self.data.failed.len(),
        }
    }

    /// Identifiers from `dois` that are not yet resolved, in input order
    pub fn pending(&self, dois: &[Doi]) -> Vec<Doi> {
        dois.iter()
            .filter(|doi| !self.is_processed(doi))
            .cloned()
            .collect()
    }

    /// Write the ledger to disk via a temporary file and rename
    fn persist(&mut self) -> LedgerResult<()> {
        self.data.last_update = Some(chrono::Local::now().to_rfc3339());
        let json = serde_json::to_string_pretty(&self.data)?;

        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(files::TEMP_FILE_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        let mut file = fs::File::create(&temp_path).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(io_err)?;
        debug!("Persisted progress ledger to {}", self.path.display());
        Ok(())
    }
}
