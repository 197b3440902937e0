//! Error taxonomy for scanning, deleting and restoring

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleanError {
    /// The directory to clean does not exist
    #[error("directory not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A single file could not be accessed
    #[error("permission denied: {}: {source}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backup rename failed; the original file is untouched
    #[error("failed to rename {} to its backup: {source}", path.display())]
    Rename {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {reason}", path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no deleted files to restore")]
    NothingToRestore,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl CleanError {
    /// Wrap an I/O error with a human readable context line
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        CleanError::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify a per-file I/O error, keeping permission problems distinct
    pub fn for_path(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::PermissionDenied {
            CleanError::Permission { path, source }
        } else {
            CleanError::io(format!("I/O error on {}", path.display()), source)
        }
    }
}

pub type Result<T> = std::result::Result<T, CleanError>;
