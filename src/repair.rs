//! The repair engine (C8): preview a set of declarative actions for a [`ValidationReport`], then
//! apply the automated subset as a byte-precise, atomic transform.
//!
//! Two phases, two different inputs. [`preview`] only looks at findings, no file bytes, and
//! answers "what would repairing this look like". [`apply`] takes an actual source file and a
//! preview and produces a new file; the source is never touched, and a failed apply never leaves
//! a partially-written destination behind.
//!
//! PDF structural defects are the only ones with automated fixes in this core: trailer/startxref
//! problems are byte-level edits a scanner can undo mechanically. EPUB findings are always
//! `manual_*`: fixing an accessibility gap or a broken nav link means rewriting markup, which
//! this crate treats as an authoring decision, not a repair.

pub mod pdf;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::diagnostics::{DetailValue, Finding, ValidationReport};
use crate::error::OperationalError;

/// The kind of transform one [`RepairAction`] represents.
///
/// The three automated variants line up with the byte-level transforms in [`pdf`]; every other
/// finding gets one of the `Manual*` variants, grouped roughly by the component that raised it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ActionType {
    /// Append a trailing `%%EOF` marker (see [`pdf::append_eof_marker`]).
    AppendEofMarker,
    /// Rewrite the `startxref` offset to match the actual `xref` table position.
    RecomputeStartxref,
    /// Fix a small set of known trailer-dictionary key typos.
    FixTrailerTypos,
    /// The PDF header itself is unreadable or unsupported; requires a human.
    ManualPdfHeader,
    /// The cross-reference table is malformed beyond mechanical repair.
    ManualPdfXref,
    /// The document catalog is missing or malformed.
    ManualPdfCatalog,
    /// Some other structural defect (unbalanced dictionaries, stream length mismatch, ...).
    ManualPdfStructure,
    /// EPUB container (`mimetype`/`META-INF`) defect.
    ManualEpubContainer,
    /// EPUB package document (OPF) defect.
    ManualEpubPackage,
    /// EPUB navigation document defect.
    ManualEpubNavigation,
    /// EPUB content document defect.
    ManualEpubContent,
    /// EPUB accessibility gap.
    ManualEpubAccessibility,
}

impl ActionType {
    /// The snake_case identifier used in reports and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::AppendEofMarker => "append_eof_marker",
            ActionType::RecomputeStartxref => "recompute_startxref",
            ActionType::FixTrailerTypos => "fix_trailer_typos",
            ActionType::ManualPdfHeader => "manual_pdf_header",
            ActionType::ManualPdfXref => "manual_pdf_xref",
            ActionType::ManualPdfCatalog => "manual_pdf_catalog",
            ActionType::ManualPdfStructure => "manual_pdf_structure",
            ActionType::ManualEpubContainer => "manual_epub_container",
            ActionType::ManualEpubPackage => "manual_epub_package",
            ActionType::ManualEpubNavigation => "manual_epub_navigation",
            ActionType::ManualEpubContent => "manual_epub_content",
            ActionType::ManualEpubAccessibility => "manual_epub_accessibility",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for ActionType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One declarative step in a [`RepairPreview`].
#[derive(Clone, Debug, serde::Serialize)]
pub struct RepairAction {
    /// What kind of transform this is.
    pub action_type: ActionType,
    /// Human-readable description, suitable for CLI or report display.
    pub description: String,
    /// The component this action targets (e.g. `pdf-trailer`, `epub-navigation`).
    pub target: String,
    /// Well-known details: automated actions carry the transform's parameters, manual actions
    /// carry a `reason` (the finding's message) and the originating `code`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, DetailValue>,
    /// Whether [`apply`] can perform this action without human intervention.
    pub automated: bool,
}

/// The result of planning a repair: an ordered action list plus summary flags.
#[derive(Clone, Debug, serde::Serialize)]
pub struct RepairPreview {
    /// Actions in the same order as the findings that produced them.
    pub actions: Vec<RepairAction>,
    /// `true` iff every action in `actions` is automated (vacuously true when there are none).
    pub can_auto_repair: bool,
    /// A rough wall-clock estimate for applying the automated subset.
    #[serde(with = "duration_millis")]
    pub estimated_duration: Duration,
    /// Whether applying this preview mutates bytes and so warrants a backup.
    pub backup_required: bool,
    /// Human-readable notes about actions that need manual intervention.
    pub manual_warnings: Vec<String>,
}

/// The outcome of applying a [`RepairPreview`] to a source file.
#[derive(Clone, Debug, serde::Serialize)]
pub struct RepairResult {
    /// Whether the apply completed and the destination file was committed.
    pub success: bool,
    /// The subset of `preview.actions` that were actually applied.
    pub applied_actions: Vec<RepairAction>,
    /// Re-validation of the repaired output, when the caller requested it.
    pub report: Option<ValidationReport>,
    /// Where the repaired bytes were written, on success.
    pub output_path: Option<PathBuf>,
    /// Where a backup of the untouched source was written, if one was requested.
    pub backup_path: Option<PathBuf>,
    /// Failure description, when `success` is `false`.
    pub error: Option<String>,
}

/// Plan a repair for every error-severity finding in `report`.
///
/// Warnings and info findings never invalidate a document, so they never need repairing; the
/// planner only looks at `report.errors`. Action order matches finding (discovery) order.
pub fn preview(report: &ValidationReport) -> RepairPreview {
    let actions: Vec<RepairAction> = report.errors.iter().filter_map(plan_action).collect();

    let can_auto_repair = actions.iter().all(|action| action.automated);
    let backup_required = actions.iter().any(|action| action.automated);
    let estimated_duration = Duration::from_millis(20 * actions.len().max(1) as u64);
    let manual_warnings = actions
        .iter()
        .filter(|action| !action.automated)
        .map(|action| format!("{}: {}", action.target, action.description))
        .collect();

    RepairPreview {
        actions,
        can_auto_repair,
        estimated_duration,
        backup_required,
        manual_warnings,
    }
}

fn plan_action(finding: &Finding) -> Option<RepairAction> {
    match finding.code.as_str() {
        "PDF-TRAILER-003" => Some(RepairAction {
            action_type: ActionType::AppendEofMarker,
            description: "append a trailing %%EOF marker".to_owned(),
            target: "pdf-trailer".to_owned(),
            details: BTreeMap::new(),
            automated: true,
        }),
        "PDF-TRAILER-001" => Some(RepairAction {
            action_type: ActionType::RecomputeStartxref,
            description: "rewrite startxref to the actual xref table offset".to_owned(),
            target: "pdf-trailer".to_owned(),
            details: BTreeMap::new(),
            automated: true,
        }),
        "PDF-TRAILER-002" => Some(RepairAction {
            action_type: ActionType::FixTrailerTypos,
            description: "fix known trailer dictionary key typos (/Sise, /root)".to_owned(),
            target: "pdf-trailer".to_owned(),
            details: BTreeMap::new(),
            automated: true,
        }),
        code if code.starts_with("PDF-HEADER") => Some(manual_action(ActionType::ManualPdfHeader, "pdf-header", finding)),
        code if code.starts_with("PDF-XREF") => Some(manual_action(ActionType::ManualPdfXref, "pdf-xref", finding)),
        code if code.starts_with("PDF-CATALOG") => Some(manual_action(ActionType::ManualPdfCatalog, "pdf-catalog", finding)),
        code if code.starts_with("PDF-STRUCTURE") => {
            Some(manual_action(ActionType::ManualPdfStructure, "pdf-structure", finding))
        }
        code if code.starts_with("EPUB-CONTAINER") || code.starts_with("EPUB-OPF") => {
            Some(manual_action(ActionType::ManualEpubContainer, epub_target(code), finding))
        }
        code if code.starts_with("EPUB-NAV") => Some(manual_action(ActionType::ManualEpubNavigation, "epub-navigation", finding)),
        code if code.starts_with("EPUB-CONTENT") => Some(manual_action(ActionType::ManualEpubContent, "epub-content", finding)),
        code if code.starts_with("EPUB-A11Y") => {
            Some(manual_action(ActionType::ManualEpubAccessibility, "epub-accessibility", finding))
        }
        _ => None,
    }
}

fn epub_target(code: &str) -> &'static str {
    if code.starts_with("EPUB-CONTAINER") {
        "epub-container"
    } else {
        "epub-package"
    }
}

fn manual_action(action_type: ActionType, target: &str, finding: &Finding) -> RepairAction {
    let mut details = BTreeMap::new();
    details.insert("code".to_owned(), DetailValue::from(finding.code.clone()));
    details.insert("reason".to_owned(), DetailValue::from(finding.message.clone()));
    RepairAction {
        action_type,
        description: finding.message.clone(),
        target: target.to_owned(),
        details,
        automated: false,
    }
}

/// Apply the automated actions in `preview` to `source`, writing the result to `destination`.
///
/// `source` is read in full and never modified; the repaired bytes are written to a temporary
/// file alongside `destination` and committed with a single atomic rename, so a crash or a
/// failing transform never leaves `destination` partially written. Manual actions are skipped,
/// not attempted.
pub fn apply(source: &Path, preview: &RepairPreview, destination: &Path) -> RepairResult {
    let mut buffer = match fs::read(source) {
        Ok(bytes) => bytes,
        Err(error) => return failure(format!("unable to read '{}': {error}", source.display())),
    };

    let mut applied = Vec::new();
    for action in &preview.actions {
        if !action.automated {
            continue;
        }
        let outcome = match action.action_type {
            ActionType::AppendEofMarker => {
                pdf::append_eof_marker(&mut buffer);
                Ok(())
            }
            ActionType::RecomputeStartxref => pdf::recompute_startxref(&mut buffer),
            ActionType::FixTrailerTypos => pdf::fix_trailer_typos(&mut buffer),
            _ => Ok(()),
        };
        match outcome {
            Ok(()) => applied.push(action.clone()),
            Err(message) => {
                return RepairResult {
                    success: false,
                    applied_actions: applied,
                    report: None,
                    output_path: None,
                    backup_path: None,
                    error: Some(format!("{} failed: {message}", action.action_type)),
                };
            }
        }
    }

    match commit(destination, &buffer) {
        Ok(()) => RepairResult {
            success: true,
            applied_actions: applied,
            report: None,
            output_path: Some(destination.to_path_buf()),
            backup_path: None,
            error: None,
        },
        Err(error) => RepairResult {
            success: false,
            applied_actions: applied,
            report: None,
            output_path: None,
            backup_path: None,
            error: Some(error.to_string()),
        },
    }
}

/// Apply `preview` in place: `source` is repaired into a temporary file in its own directory,
/// optionally backed up first, then renamed over `source` as the atomic commit.
///
/// `backup_path`, when given, receives an exact copy of `source` before any bytes are touched.
pub fn apply_in_place(source: &Path, preview: &RepairPreview, backup_path: Option<&Path>) -> RepairResult {
    let mut result = RepairResult {
        success: false,
        applied_actions: Vec::new(),
        report: None,
        output_path: None,
        backup_path: None,
        error: None,
    };

    if let Some(backup_path) = backup_path {
        if let Err(error) = backup(source, backup_path) {
            result.error = Some(error.to_string());
            return result;
        }
        result.backup_path = Some(backup_path.to_path_buf());
    }

    let applied = apply(source, preview, source);
    RepairResult {
        backup_path: result.backup_path,
        ..applied
    }
}

/// Copy `source` to `backup_path` unmodified, for callers that want an explicit restore point
/// before calling [`apply_in_place`] themselves.
pub fn backup(source: &Path, backup_path: &Path) -> Result<(), OperationalError> {
    fs::copy(source, backup_path)
        .map(|_| ())
        .map_err(|error| OperationalError::Write { path: backup_path.to_path_buf(), source: error })
}

/// Restore `destination` from a backup previously written by [`backup`].
pub fn restore(backup_path: &Path, destination: &Path) -> Result<(), OperationalError> {
    fs::copy(backup_path, destination)
        .map(|_| ())
        .map_err(|error| OperationalError::Write { path: destination.to_path_buf(), source: error })
}

fn commit(destination: &Path, bytes: &[u8]) -> Result<(), OperationalError> {
    let parent = destination.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".vellum-repair-")
        .tempfile_in(parent)
        .map_err(|error| OperationalError::Write { path: destination.to_path_buf(), source: error })?;

    use std::io::Write as _;
    temp.write_all(bytes)
        .map_err(|error| OperationalError::Write { path: destination.to_path_buf(), source: error })?;
    temp.flush()
        .map_err(|error| OperationalError::Write { path: destination.to_path_buf(), source: error })?;

    temp.persist(destination)
        .map_err(|error| OperationalError::Write { path: destination.to_path_buf(), source: error.error })?;
    Ok(())
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
    }
}

fn failure(message: String) -> RepairResult {
    RepairResult {
        success: false,
        applied_actions: Vec::new(),
        report: None,
        output_path: None,
        backup_path: None,
        error: Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{FileType, FindingSink};
    use sha2::{Digest, Sha256};
    use std::time::Duration as StdDuration;

    fn minimal_pdf() -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let obj1_offset = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let obj2_offset = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref_offset = pdf.len();
        pdf.extend_from_slice(b"xref\n0 3\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{:010} 00000 n \n", obj1_offset).as_bytes());
        pdf.extend_from_slice(format!("{:010} 00000 n \n", obj2_offset).as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{xref_offset}\n").as_bytes());
        pdf.extend_from_slice(b"%%EOF\n");
        pdf
    }

    fn report_with_errors(codes: &[&'static str]) -> ValidationReport {
        let mut sink = FindingSink::new();
        for code in codes {
            sink.emit(code, format!("synthetic finding for {code}"));
        }
        sink.into_report(PathBuf::from("doc.pdf"), FileType::Pdf, chrono::Utc::now(), StdDuration::ZERO, BTreeMap::new())
    }

    #[test]
    fn preview_classifies_automated_and_manual_actions() {
        let report = report_with_errors(&["PDF-TRAILER-003", "PDF-CATALOG-001"]);
        let plan = preview(&report);
        assert_eq!(plan.actions.len(), 2);
        assert!(!plan.can_auto_repair);
        assert!(plan.backup_required);
        assert_eq!(plan.actions[0].action_type, ActionType::AppendEofMarker);
        assert!(plan.actions[0].automated);
        assert_eq!(plan.actions[1].action_type, ActionType::ManualPdfCatalog);
        assert!(!plan.actions[1].automated);
    }

    #[test]
    fn preview_with_only_automated_findings_can_auto_repair() {
        let report = report_with_errors(&["PDF-TRAILER-003"]);
        let plan = preview(&report);
        assert!(plan.can_auto_repair);
    }

    #[test]
    fn apply_appends_eof_marker_and_leaves_source_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("broken.pdf");
        let dest_path = dir.path().join("fixed.pdf");

        let mut pdf = minimal_pdf();
        let len = pdf.len();
        pdf.truncate(len - b"%%EOF\n".len());
        fs::write(&source_path, &pdf).unwrap();
        let source_hash_before = sha2::Sha256::digest(fs::read(&source_path).unwrap());

        let report = report_with_errors(&["PDF-TRAILER-003"]);
        let plan = preview(&report);
        let result = apply(&source_path, &plan, &dest_path);

        assert!(result.success, "apply failed: {:?}", result.error);
        assert_eq!(result.applied_actions.len(), 1);

        let repaired = fs::read(&dest_path).unwrap();
        assert!(repaired.ends_with(b"%%EOF\n"));

        let source_hash_after = sha2::Sha256::digest(fs::read(&source_path).unwrap());
        assert_eq!(source_hash_before, source_hash_after, "source must not be mutated by apply");
    }

    #[test]
    fn apply_in_place_backs_up_before_mutating() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("doc.pdf");
        let backup_path = dir.path().join("doc.pdf.bak");

        let mut pdf = minimal_pdf();
        let len = pdf.len();
        pdf.truncate(len - b"%%EOF\n".len());
        fs::write(&source_path, &pdf).unwrap();
        let original = fs::read(&source_path).unwrap();

        let report = report_with_errors(&["PDF-TRAILER-003"]);
        let plan = preview(&report);
        let result = apply_in_place(&source_path, &plan, Some(&backup_path));

        assert!(result.success, "apply_in_place failed: {:?}", result.error);
        assert_eq!(fs::read(&backup_path).unwrap(), original);
        assert!(fs::read(&source_path).unwrap().ends_with(b"%%EOF\n"));
    }

    #[test]
    fn round_trip_repair_reduces_error_count() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("broken.pdf");
        let dest_path = dir.path().join("fixed.pdf");

        let mut pdf = minimal_pdf();
        let len = pdf.len();
        pdf.truncate(len - b"%%EOF\n".len());
        fs::write(&source_path, &pdf).unwrap();

        let mut before_sink = FindingSink::new();
        let before_info = crate::pdf::scanner::validate(&pdf, &mut before_sink);
        let _ = before_info;
        let before_report = before_sink.into_report(
            source_path.clone(),
            FileType::Pdf,
            chrono::Utc::now(),
            StdDuration::ZERO,
            BTreeMap::new(),
        );
        assert!(before_report.errors.iter().any(|f| f.code == "PDF-TRAILER-003"));

        let plan = preview(&before_report);
        let result = apply(&source_path, &plan, &dest_path);
        assert!(result.success);

        let repaired_bytes = fs::read(&dest_path).unwrap();
        let mut after_sink = FindingSink::new();
        crate::pdf::scanner::validate(&repaired_bytes, &mut after_sink);
        assert!(after_sink.errors().iter().all(|f| f.code != "PDF-TRAILER-003"));
        assert!(after_sink.error_count() < before_report.errors.len());
    }
}
