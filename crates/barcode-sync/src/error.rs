//! Error types for barcode synchronization
//!
//! Everything here aborts a run and leaves the last-processed marker untouched.
//! Per-file source problems are reported separately through
//! [`crate::local::SourceFileError`] and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The externally maintained current revision file does not exist
    #[error("Current revision marker not found at '{}'. Update the data checkout so it writes this file.", path.display())]
    CurrentMarkerMissing { path: PathBuf },

    /// A marker file exists but could not be read or written
    #[error("Revision marker '{}' could not be accessed: {source}", path.display())]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source data directory could not be listed
    #[error("Source directory '{}' could not be read: {source}", path.display())]
    SourceDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connecting to the database failed
    #[error("Remote database unavailable: {0}. Check DATABASE_URL or the DB_* connection settings.")]
    RemoteUnavailable(#[source] sqlx::Error),

    /// A query, insert or commit failed on an open connection
    #[error("Remote database operation failed: {0}")]
    Remote(#[source] sqlx::Error),

    /// Schema or table name is not a plain SQL identifier
    #[error("Invalid SQL identifier '{0}'. Use letters, digits and underscores only.")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True for failures that originate in the database layer
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::Remote(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        let err = SyncError::CurrentMarkerMissing {
            path: PathBuf::from("/data/current_commit_hash"),
        };
        assert!(err.to_string().contains("/data/current_commit_hash"));
    }

    #[test]
    fn test_is_remote() {
        assert!(SyncError::Remote(sqlx::Error::RowNotFound).is_remote());
        assert!(SyncError::RemoteUnavailable(sqlx::Error::PoolTimedOut).is_remote());
        assert!(!SyncError::config("bad").is_remote());
    }
}
