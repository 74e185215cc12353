//! Revision markers gating each run
//!
//! The data checkout's updater writes the current revision identifier to
//! `current_commit_hash`; a successful sync copies it to `last_commit_hash`.
//! Both are opaque strings compared byte for byte.

use crate::error::{Result, SyncError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CURRENT_MARKER_FILE: &str = "current_commit_hash";
pub const LAST_MARKER_FILE: &str = "last_commit_hash";

/// Outcome of comparing the two markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionCheck {
    /// Current revision was already processed
    UpToDate { revision: String },
    /// Current revision differs from the last processed one
    Changed { current: String, last: String },
}

impl RevisionCheck {
    pub fn needs_sync(&self) -> bool {
        matches!(self, RevisionCheck::Changed { .. })
    }
}

/// The marker file pair
#[derive(Debug, Clone)]
pub struct CommitMarkers {
    current_path: PathBuf,
    last_path: PathBuf,
}

impl CommitMarkers {
    pub fn new(current_path: impl Into<PathBuf>, last_path: impl Into<PathBuf>) -> Self {
        Self {
            current_path: current_path.into(),
            last_path: last_path.into(),
        }
    }

    /// Markers with the standard file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(CURRENT_MARKER_FILE), dir.join(LAST_MARKER_FILE))
    }

    pub fn last_path(&self) -> &Path {
        &self.last_path
    }

    /// Read the current revision. Its absence is fatal.
    pub fn read_current(&self) -> Result<String> {
        match std::fs::read_to_string(&self.current_path) {
            Ok(revision) => Ok(revision),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SyncError::CurrentMarkerMissing {
                path: self.current_path.clone(),
            }),
            Err(source) => Err(SyncError::Marker {
                path: self.current_path.clone(),
                source,
            }),
        }
    }

    /// Read the last processed revision, or an empty string if no run has finished yet
    pub fn read_last(&self) -> Result<String> {
        match std::fs::read_to_string(&self.last_path) {
            Ok(revision) => Ok(revision),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.last_path.display(), "No last revision marker, treating as first run");
                Ok(String::new())
            },
            Err(source) => Err(SyncError::Marker {
                path: self.last_path.clone(),
                source,
            }),
        }
    }

    pub fn check(&self) -> Result<RevisionCheck> {
        let current = self.read_current()?;
        let last = self.read_last()?;

        if current == last {
            Ok(RevisionCheck::UpToDate { revision: current })
        } else {
            Ok(RevisionCheck::Changed { current, last })
        }
    }

    /// Persist `revision` as the last processed one
    pub fn record(&self, revision: &str) -> Result<()> {
        std::fs::write(&self.last_path, revision).map_err(|source| SyncError::Marker {
            path: self.last_path.clone(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_current_is_fatal() {
        let dir = TempDir::new().unwrap();
        let markers = CommitMarkers::in_dir(dir.path());
        assert!(matches!(
            markers.check(),
            Err(SyncError::CurrentMarkerMissing { .. })
        ));
    }

    #[test]
    fn test_missing_last_means_changed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CURRENT_MARKER_FILE), "abc123\n").unwrap();

        let check = CommitMarkers::in_dir(dir.path()).check().unwrap();
        assert_eq!(
            check,
            RevisionCheck::Changed {
                current: "abc123\n".to_string(),
                last: String::new(),
            }
        );
        assert!(check.needs_sync());
    }

    #[test]
    fn test_record_then_up_to_date() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CURRENT_MARKER_FILE), "abc123").unwrap();
        let markers = CommitMarkers::in_dir(dir.path());

        markers.record("abc123").unwrap();

        assert_eq!(std::fs::read_to_string(markers.last_path()).unwrap(), "abc123");
        assert!(!markers.check().unwrap().needs_sync());
    }

    #[test]
    fn test_comparison_is_exact() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CURRENT_MARKER_FILE), "abc123\n").unwrap();
        std::fs::write(dir.path().join(LAST_MARKER_FILE), "abc123").unwrap();

        assert!(CommitMarkers::in_dir(dir.path()).check().unwrap().needs_sync());
    }

    #[test]
    fn test_empty_current_with_no_last_is_up_to_date() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CURRENT_MARKER_FILE), "").unwrap();

        let check = CommitMarkers::in_dir(dir.path()).check().unwrap();
        assert_eq!(check, RevisionCheck::UpToDate { revision: String::new() });
    }
}
