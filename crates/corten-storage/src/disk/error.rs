//! Disk provider errors.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for disk provider operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors that can occur in a disk provider.
#[derive(Debug, Error)]
pub enum DiskError {
    /// I/O error without file context.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// I/O error on a specific file.
    #[error("I/O error on {path}: {source}")]
    IoAt {
        /// Path of the file the operation failed on.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Caller passed a buffer whose length differs from the page size.
    #[error("buffer of {actual} bytes does not match page size {expected}")]
    PageSizeMismatch {
        /// The provider's page size.
        expected: usize,
        /// The length of the buffer the caller supplied.
        actual: usize,
    },
}

impl DiskError {
    /// Creates an I/O error carrying the path it occurred on.
    pub fn from_io_with_path(source: io::Error, path: impl AsRef<Path>) -> Self {
        Self::IoAt {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
