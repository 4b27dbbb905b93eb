//! Identifier source
//!
//! Reads the ordered list of identifiers from a CSV file with a `doi` column.
//! Empty cells and the literal placeholder "no doi" are skipped.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::app::models::Doi;
use crate::constants::files;
use crate::errors::{SourceError, SourceResult};

/// Read identifiers from the CSV file at `path`, keeping input order
///
/// # Errors
///
/// Returns `SourceError` if the file is missing, has no `doi` column, or
/// cannot be parsed as CSV.
pub fn read_identifiers(path: &Path) -> SourceResult<Vec<Doi>> {
    if !path.exists() {
        return Err(SourceError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let file = std::fs::File::open(path)?;
    let identifiers = parse_identifiers(file).map_err(|e| match e {
        SourceError::MissingColumn { column, .. } => SourceError::MissingColumn {
            path: path.to_path_buf(),
            column,
        },
        other => other,
    })?;

    info!(
        "Found {} identifiers in {}",
        identifiers.len(),
        path.display()
    );
    Ok(identifiers)
}

/// Parse identifiers from any CSV reader
pub fn parse_identifiers<R: std::io::Read>(reader: R) -> SourceResult<Vec<Doi>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let column = csv_reader
        .headers()?
        .iter()
        .position(|header| {
            header
                .trim_start_matches('\u{feff}')
                .trim()
                .eq_ignore_ascii_case(files::DOI_COLUMN)
        })
        .ok_or_else(|| SourceError::MissingColumn {
            path: Default::default(),
            column: files::DOI_COLUMN.to_string(),
        })?;

    let mut seen = HashSet::new();
    let mut identifiers = Vec::new();
    let mut skipped = 0usize;

    for record in csv_reader.records() {
        let record = record?;
        let value = record.get(column).map(str::trim).unwrap_or_default();

        if !is_usable_identifier(value) {
            skipped += 1;
            continue;
        }

        if seen.insert(value.to_string()) {
            identifiers.push(Doi::new(value));
        } else {
            debug!("Skipping duplicate identifier {}", value);
        }
    }

    if skipped > 0 {
        debug!("Skipped {} rows without an identifier", skipped);
    }

    Ok(identifiers)
}

/// Whether a cell value names a real identifier
pub fn is_usable_identifier(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case(files::NO_DOI_PLACEHOLDER)
}
