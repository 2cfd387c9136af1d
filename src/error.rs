//! Operational failures: the plane distinct from [`Finding`](crate::diagnostics::Finding)s.
//!
//! An [`OperationalError`] means no [`ValidationReport`](crate::diagnostics::ValidationReport)
//! could be produced at all: the file could not be opened, the ZIP central directory could not
//! be located, or an internal invariant was violated while planning a repair. Findings, by
//! contrast, are the expected output of a validator and never unwind through this type.

use std::io;
use std::path::PathBuf;

/// Failures that prevent a [`ValidationReport`](crate::diagnostics::ValidationReport) from being
/// produced at all.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum OperationalError {
    /// The given path does not exist or could not be opened.
    #[error("unable to open '{path}': {source}")]
    Open {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A read failed partway through processing a file.
    #[error("read failed for '{path}': {source}")]
    Read {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A write failed while applying a repair or writing a report.
    #[error("write failed for '{path}': {source}")]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The byte source could not be read as a ZIP archive at all.
    #[error("'{path}' is not a readable ZIP archive: {source}")]
    NotAZip {
        /// Path that was expected to be a ZIP container.
        path: PathBuf,
        /// Underlying ZIP library failure.
        #[source]
        source: zip::result::ZipError,
    },

    /// A repair preview could not be generated because of an internal-invariant violation.
    #[error("unable to plan repair: {0}")]
    RepairPlanning(String),

    /// The caller requested cancellation before any work could start.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias matching the rest of the crate's `Result` usage.
pub type OperationalResult<T> = Result<T, OperationalError>;
