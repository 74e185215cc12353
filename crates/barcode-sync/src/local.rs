//! Local barcode reference loaded from the data checkout
//!
//! Every regular file in the source directory (minus the exclusion list) is
//! read as a tab-separated table with a header row. Only the barcode and name
//! columns are kept. Files are visited in file-name order and the first row
//! seen for a barcode wins, so the result is stable across runs.

use crate::config::SourceConfig;
use crate::error::{Result, SyncError};
use barcode_common::{Barcode, BarcodeRow, BarcodeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a single source file was skipped
#[derive(Error, Debug)]
pub enum SourceFileError {
    #[error("malformed table: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(String),
}

/// Counters collected while loading the local reference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub files_loaded: usize,
    pub files_skipped: usize,
    /// Rows with a valid barcode, duplicates included
    pub rows_read: usize,
    /// Rows dropped because the barcode cell was empty or not an integer
    pub invalid_barcodes: usize,
    pub duplicates_dropped: usize,
}

/// Barcode/name pairs read from one file
#[derive(Debug, Default)]
struct ParsedFile {
    records: Vec<(Barcode, String)>,
    invalid_barcodes: usize,
}

/// Deduplicated barcode table built from the local source files
#[derive(Debug, Clone, Default)]
pub struct LocalBarcodeReference {
    rows: Vec<BarcodeRow>,
    stats: LoadStats,
}

impl LocalBarcodeReference {
    /// Load and deduplicate every source file under `config.data_dir`
    ///
    /// Only an unreadable directory is an error. Individual files that fail to
    /// parse are logged and skipped; if none parse the table is simply empty.
    pub fn load(config: &SourceConfig) -> Result<Self> {
        let files = list_source_files(config)?;
        info!(
            dir = %config.data_dir.display(),
            files = files.len(),
            "Loading local barcode reference"
        );

        let mut reference = Self::default();
        let mut seen = BarcodeSet::new();

        for path in files {
            let parsed = match read_source_file(&path, config) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unparsable source file");
                    reference.stats.files_skipped += 1;
                    continue;
                },
            };

            debug!(
                file = %path.display(),
                rows = parsed.records.len(),
                invalid_barcodes = parsed.invalid_barcodes,
                "Loaded source file"
            );

            reference.stats.files_loaded += 1;
            reference.stats.invalid_barcodes += parsed.invalid_barcodes;
            reference.stats.rows_read += parsed.records.len();

            for (barcode, name) in parsed.records {
                if seen.insert(barcode) {
                    reference.rows.push(BarcodeRow::new(barcode, name, config.owner));
                } else {
                    reference.stats.duplicates_dropped += 1;
                }
            }
        }

        info!(
            rows = reference.rows.len(),
            files_loaded = reference.stats.files_loaded,
            files_skipped = reference.stats.files_skipped,
            duplicates_dropped = reference.stats.duplicates_dropped,
            "Local barcode reference loaded"
        );

        Ok(reference)
    }

    /// Build a reference from rows already in memory, keeping the first row per barcode
    pub fn from_rows(rows: impl IntoIterator<Item = BarcodeRow>) -> Self {
        let mut reference = Self::default();
        let mut seen = BarcodeSet::new();

        for row in rows {
            reference.stats.rows_read += 1;
            if seen.insert(row.barcode) {
                reference.rows.push(row);
            } else {
                reference.stats.duplicates_dropped += 1;
            }
        }

        reference
    }

    pub fn barcodes(&self) -> BarcodeSet {
        self.rows.iter().map(|row| row.barcode).collect()
    }

    /// Rows whose barcode is in `barcodes`, in table order
    pub fn rows_for(&self, barcodes: &BarcodeSet) -> Vec<BarcodeRow> {
        self.rows
            .iter()
            .filter(|row| barcodes.contains(&row.barcode))
            .cloned()
            .collect()
    }

    pub fn rows(&self) -> &[BarcodeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }
}

/// Regular files in the data directory, excluded names removed, sorted by name
fn list_source_files(config: &SourceConfig) -> Result<Vec<PathBuf>> {
    let dir_error = |source| SyncError::SourceDirectory {
        path: config.data_dir.clone(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&config.data_dir).map_err(dir_error)? {
        let entry = entry.map_err(dir_error)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        if config.is_excluded(&name) {
            debug!(file = %name, "Skipping excluded file");
            continue;
        }

        if !path.is_file() {
            debug!(path = %path.display(), "Skipping non-file entry");
            continue;
        }

        files.push(path);
    }

    files.sort();
    Ok(files)
}

fn read_source_file(
    path: &Path,
    config: &SourceConfig,
) -> std::result::Result<ParsedFile, SourceFileError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let column = |wanted: &str| {
        headers
            .iter()
            .position(|h| h.trim() == wanted)
            .ok_or_else(|| SourceFileError::MissingColumn(wanted.to_string()))
    };
    let barcode_idx = column(&config.barcode_column)?;
    let name_idx = column(&config.name_column)?;

    let mut parsed = ParsedFile::default();
    for record in reader.records() {
        let record = record?;
        let barcode = record.get(barcode_idx).unwrap_or_default().trim();

        match barcode.parse::<Barcode>() {
            Ok(barcode) => {
                let name = record.get(name_idx).unwrap_or_default().to_string();
                parsed.records.push((barcode, name));
            },
            Err(_) => parsed.invalid_barcodes += 1,
        }
    }

    Ok(parsed)
}
