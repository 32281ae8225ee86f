//! Errors raised while reading or writing the judging data files.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A reference file the caller asked for does not exist.
    #[error("{what} not found at {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// The submission failed validation and nothing was written.
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("column {column} missing from {}", path.display())]
    MissingColumn { column: &'static str, path: PathBuf },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::InvalidSubmission(_))
    }
}
