//! vellum: a structural validator and safe repair engine for EPUB and PDF documents.
//!
//! The crate is organized around two disjoint error planes. An [`OperationalError`] means no
//! [`ValidationReport`] could be produced at all (the file couldn't be opened, the ZIP central
//! directory is unreadable, an internal invariant was violated while planning a repair).
//! Everything else (every structural or accessibility defect a validator discovers) is a
//! [`Finding`] inside the report it returns; findings never unwind.
//!
//! Every public entry point is stateless, safe to call concurrently, and accepts a
//! [`CancellationToken`] so long-running batch or repair work can be interrupted cooperatively.

pub mod batch;
pub mod cancel;
pub mod container;
pub mod diagnostics;
pub mod epub;
pub mod error;
pub mod pdf;
pub mod repair;
pub mod report;
mod util;

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;

pub use cancel::CancellationToken;
pub use diagnostics::{DetailValue, FileType, Finding, FindingSink, Location, Severity, ValidationReport};
pub use error::{OperationalError, OperationalResult};
pub use repair::{RepairAction, RepairPreview, RepairResult};
pub use report::{ReportFilter, ReportOptions, Reporter};

/// Options controlling which optional sub-checks a validation run performs.
///
/// Strictness itself is never configurable; every validator is "maximally diagnostic": it keeps
/// emitting findings after the first rule violation rather than stopping early. A caller who
/// doesn't need the accessibility pass (say, a fast structural-only check in a pre-commit hook)
/// can skip it here instead.
#[derive(Copy, Clone, Debug)]
pub struct ValidateOptions {
    /// Skip the EPUB accessibility scorer (C6). Has no effect on PDF validation.
    pub skip_accessibility: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self { skip_accessibility: false }
    }
}

/// Validate an EPUB file on disk.
pub fn validate_epub(
    path: impl AsRef<Path>,
    options: ValidateOptions,
    cancel: &CancellationToken,
) -> OperationalResult<ValidationReport> {
    let path = path.as_ref().to_path_buf();
    if cancel.is_cancelled() {
        return Err(OperationalError::Cancelled);
    }
    let file = util::open_file(&path)?;
    Ok(validate_epub_reader(file, path, options))
}

/// Validate an EPUB held entirely in memory.
pub fn validate_epub_bytes(bytes: Vec<u8>, options: ValidateOptions, cancel: &CancellationToken) -> OperationalResult<ValidationReport> {
    if cancel.is_cancelled() {
        return Err(OperationalError::Cancelled);
    }
    Ok(validate_epub_reader(Cursor::new(bytes), PathBuf::from("<memory>"), options))
}

fn validate_epub_reader<R: std::io::Read + std::io::Seek>(
    reader: R,
    path: PathBuf,
    options: ValidateOptions,
) -> ValidationReport {
    let started_at = Utc::now();
    let start = Instant::now();
    let mut sink = FindingSink::new();

    let mut zip = match container::ZipContainer::open(reader) {
        Ok(zip) => zip,
        Err(OperationalError::NotAZip { source, .. }) => {
            sink.emit("EPUB-CONTAINER-001", format!("'{}' is not a readable ZIP archive: {source}", path.display()));
            return sink.into_report(path, FileType::Epub, started_at, start.elapsed(), BTreeMap::new());
        }
        Err(_other) => {
            // `ZipContainer::open` never returns a variant other than `NotAZip`; treated the same
            // way defensively so a future I/O-surfacing change here degrades to a finding too.
            sink.emit("EPUB-CONTAINER-001", format!("'{}' could not be opened as a ZIP archive", path.display()));
            return sink.into_report(path, FileType::Epub, started_at, start.elapsed(), BTreeMap::new());
        }
    };

    let metadata = epub::validate(&mut zip, options.skip_accessibility, &mut sink);
    sink.into_report(path, FileType::Epub, started_at, start.elapsed(), metadata)
}

/// Validate a PDF file on disk.
pub fn validate_pdf(
    path: impl AsRef<Path>,
    options: ValidateOptions,
    cancel: &CancellationToken,
) -> OperationalResult<ValidationReport> {
    let path = path.as_ref().to_path_buf();
    if cancel.is_cancelled() {
        return Err(OperationalError::Cancelled);
    }
    let bytes = util::read_file(&path)?;
    Ok(validate_pdf_reader(bytes, path, options))
}

/// Validate a PDF held entirely in memory.
pub fn validate_pdf_bytes(bytes: Vec<u8>, options: ValidateOptions, cancel: &CancellationToken) -> OperationalResult<ValidationReport> {
    if cancel.is_cancelled() {
        return Err(OperationalError::Cancelled);
    }
    Ok(validate_pdf_reader(bytes, PathBuf::from("<memory>"), options))
}

fn validate_pdf_reader(bytes: Vec<u8>, path: PathBuf, _options: ValidateOptions) -> ValidationReport {
    let started_at = Utc::now();
    let start = Instant::now();
    let mut sink = FindingSink::new();
    let info = pdf::scanner::validate(&bytes, &mut sink);
    let metadata = BTreeMap::from(&info);
    sink.into_report(path, FileType::Pdf, started_at, start.elapsed(), metadata)
}

/// Preview the repairs available for a previously-produced [`ValidationReport`].
///
/// A thin facade entry point over [`repair::preview`] so callers don't need `vellum::repair::*`
/// for the common path; [`repair`] itself remains available for [`repair::apply_in_place`] and
/// the explicit [`repair::backup`]/[`repair::restore`] pair.
pub fn preview_repair(report: &ValidationReport) -> RepairPreview {
    repair::preview(report)
}

/// Apply the automated subset of `preview` to `source`, writing the result to `destination`.
///
/// `source` is never modified. See [`repair::apply_in_place`] for the in-place variant (backup
/// then atomic rename over the source) that the CLI's `--in-place` flag uses.
pub fn apply_repair(source: impl AsRef<Path>, preview: &RepairPreview, destination: impl AsRef<Path>) -> RepairResult {
    repair::apply(source.as_ref(), preview, destination.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, data) in entries {
                let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn validate_epub_bytes_flags_non_zip_source() {
        let cancel = CancellationToken::new();
        let report = validate_epub_bytes(b"not a zip".to_vec(), ValidateOptions::default(), &cancel).unwrap();
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|f| f.code == "EPUB-CONTAINER-001"));
    }

    #[test]
    fn validate_epub_bytes_flags_missing_container_xml() {
        let bytes = build_zip(&[("mimetype", b"application/epub+zip")]);
        let cancel = CancellationToken::new();
        let report = validate_epub_bytes(bytes, ValidateOptions::default(), &cancel).unwrap();
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|f| f.code == "EPUB-CONTAINER-004"));
    }

    #[test]
    fn validate_pdf_bytes_reports_structural_findings() {
        let cancel = CancellationToken::new();
        let report = validate_pdf_bytes(b"not a pdf at all".to_vec(), ValidateOptions::default(), &cancel).unwrap();
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|f| f.code == "PDF-HEADER-001"));
    }

    #[test]
    fn cancelled_token_short_circuits_before_any_io() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = validate_pdf(PathBuf::from("/nonexistent/path.pdf"), ValidateOptions::default(), &cancel);
        assert!(matches!(result, Err(OperationalError::Cancelled)));
    }
}
