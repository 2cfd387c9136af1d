//! The diagnostic model (C1): [`Finding`], [`ValidationReport`], and the severity ordering that
//! ties them together.
//!
//! Every validator in this crate (EPUB or PDF) writes into a [`FindingSink`] rather than
//! returning early on the first problem. This is what makes "collect every issue in one pass"
//! trivial to honour: findings are appended, never used to unwind control flow.

pub mod codes;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Total order over severities: [`Severity::Error`] > [`Severity::Warning`] > [`Severity::Info`].
///
/// Declared `Info, Warning, Error` so the derived [`Ord`] matches that order directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational; never affects `is_valid`.
    Info,
    /// A recoverable defect; never affects `is_valid`.
    Warning,
    /// A defect serious enough to make the document invalid.
    Error,
}

impl Severity {
    /// Short lowercase name, as used on the CLI and in report output.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Which of the two document formats a [`ValidationReport`] describes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FileType {
    /// EPUB container + package document.
    Epub,
    /// PDF 1.x document.
    Pdf,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FileType::Epub => "EPUB",
            FileType::Pdf => "PDF",
        })
    }
}

/// A scalar or small nested value attached to a [`Finding`] under a well-known key.
///
/// Adapters consume `details` by key (documented per code), never by type introspection;
/// there is deliberately no `Any`-style escape hatch here.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    /// A text value.
    Text(String),
    /// A signed integer, e.g. a byte offset or a count.
    Int(i64),
    /// A floating-point value, e.g. a sub-score.
    Float(f64),
    /// A boolean flag.
    Bool(bool),
    /// A short ordered list of further values.
    List(Vec<DetailValue>),
    /// A small nested object, e.g. an accessibility score breakdown.
    Map(BTreeMap<String, DetailValue>),
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        DetailValue::Text(value.to_owned())
    }
}

impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        DetailValue::Text(value)
    }
}

impl From<i64> for DetailValue {
    fn from(value: i64) -> Self {
        DetailValue::Int(value)
    }
}

impl From<u64> for DetailValue {
    fn from(value: u64) -> Self {
        DetailValue::Int(value as i64)
    }
}

impl From<usize> for DetailValue {
    fn from(value: usize) -> Self {
        DetailValue::Int(value as i64)
    }
}

impl From<f64> for DetailValue {
    fn from(value: f64) -> Self {
        DetailValue::Float(value)
    }
}

impl From<bool> for DetailValue {
    fn from(value: bool) -> Self {
        DetailValue::Bool(value)
    }
}

impl From<BTreeMap<String, DetailValue>> for DetailValue {
    fn from(value: BTreeMap<String, DetailValue>) -> Self {
        DetailValue::Map(value)
    }
}

impl From<Vec<DetailValue>> for DetailValue {
    fn from(value: Vec<DetailValue>) -> Self {
        DetailValue::List(value)
    }
}

/// Where, within a document, a [`Finding`] was observed.
///
/// Every field is optional; a validator fills in whatever it can recover cheaply rather than
/// computing e.g. line/column for a byte-oriented PDF scan.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Location {
    /// Path inside the container (e.g. `OEBPS/content.opf`), or `None` for the top-level file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Absolute byte offset into the relevant file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
    /// 1-based line number, when the underlying parser tracks it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column number, when the underlying parser tracks it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// An XPath-ish selector, e.g. `/html/body/img[3]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// A short contextual snippet surrounding the offending bytes or element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Location {
    /// A location that only names the inner file path.
    pub fn in_file(file_path: impl Into<String>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            ..Self::default()
        }
    }

    /// A location anchored to a byte offset in the top-level file.
    pub fn at_offset(byte_offset: u64) -> Self {
        Self {
            byte_offset: Some(byte_offset),
            ..Self::default()
        }
    }

    /// Attach an XPath-ish selector within `file_path`.
    pub fn at_selector(file_path: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    /// Builder-style setter for a contextual snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Builder-style setter for a byte offset on an existing location.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.byte_offset = Some(offset);
        self
    }
}

/// One diagnostic record produced by a validator.
///
/// Immutable once constructed; producers build it through [`FindingSink::emit`] and friends
/// rather than constructing it directly, so severity is always looked up from the catalog.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Finding {
    /// Structured identifier, `<FORMAT>-<CATEGORY>-<NNN>` (e.g. `EPUB-OPF-004`).
    pub code: String,
    /// Severity of this finding.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Where the problem was observed, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Well-known, per-code details (see the catalog entry for a given code).
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub details: BTreeMap<String, DetailValue>,
    /// When this finding was produced.
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    /// Retrieve a detail value by key.
    pub fn detail(&self, key: &str) -> Option<&DetailValue> {
        self.details.get(key)
    }
}

/// Accumulator that validators write into.
///
/// Owns the three severity-bucketed vectors in discovery order; `into_report` finalises them
/// into a [`ValidationReport`]. Never short-circuits: callers keep emitting findings after a
/// rule violation so a single corrupt document still yields its full diagnostic yield, per the
/// "maximally diagnostic" contract.
#[derive(Debug)]
pub struct FindingSink {
    errors: Vec<Finding>,
    warnings: Vec<Finding>,
    info: Vec<Finding>,
}

impl FindingSink {
    /// A fresh, empty sink.
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
        }
    }

    /// Emit a finding, inferring severity from the code catalog.
    ///
    /// A code absent from the catalog (an adapter extension) defaults to
    /// [`Severity::Warning`]: documented, not a panic, since the catalog is an open set.
    pub fn emit(&mut self, code: &'static str, message: impl Into<String>) -> &Finding {
        self.emit_at(code, message, None)
    }

    /// Emit a finding with an attached [`Location`].
    pub fn emit_at(
        &mut self,
        code: &'static str,
        message: impl Into<String>,
        location: impl Into<Option<Location>>,
    ) -> &Finding {
        self.emit_with_details(code, message, location, BTreeMap::new())
    }

    /// Emit a finding with a full detail map.
    pub fn emit_with_details(
        &mut self,
        code: &'static str,
        message: impl Into<String>,
        location: impl Into<Option<Location>>,
        details: BTreeMap<String, DetailValue>,
    ) -> &Finding {
        let severity = codes::severity_of(code).unwrap_or(Severity::Warning);
        let finding = Finding {
            code: code.to_owned(),
            severity,
            message: message.into(),
            location: location.into(),
            details,
            timestamp: Utc::now(),
        };
        let bucket = match severity {
            Severity::Error => &mut self.errors,
            Severity::Warning => &mut self.warnings,
            Severity::Info => &mut self.info,
        };
        bucket.push(finding);
        bucket.last().expect("just pushed")
    }

    /// Number of error-severity findings emitted so far.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Whether any error-severity finding has been emitted.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Error-severity findings emitted so far, in discovery order.
    pub fn errors(&self) -> &[Finding] {
        &self.errors
    }

    /// Warning-severity findings emitted so far, in discovery order.
    pub fn warnings(&self) -> &[Finding] {
        &self.warnings
    }

    /// Info-severity findings emitted so far, in discovery order.
    pub fn info(&self) -> &[Finding] {
        &self.info
    }

    /// Finalise into a [`ValidationReport`].
    pub fn into_report(
        self,
        file_path: PathBuf,
        file_type: FileType,
        started_at: DateTime<Utc>,
        duration: Duration,
        metadata: BTreeMap<String, DetailValue>,
    ) -> ValidationReport {
        ValidationReport {
            file_path,
            file_type,
            is_valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            info: self.info,
            started_at,
            duration,
            metadata,
        }
    }
}

impl Default for FindingSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-document aggregate produced by a validator.
///
/// `is_valid` is derived, never set directly: it holds iff `errors` is empty, and this
/// invariant is enforced at construction time by [`FindingSink::into_report`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ValidationReport {
    /// Path to the file that was validated.
    pub file_path: PathBuf,
    /// Which format was validated.
    pub file_type: FileType,
    /// `true` iff `errors` is empty.
    pub is_valid: bool,
    /// Error-severity findings, in discovery order.
    pub errors: Vec<Finding>,
    /// Warning-severity findings, in discovery order.
    pub warnings: Vec<Finding>,
    /// Info-severity findings, in discovery order.
    pub info: Vec<Finding>,
    /// Wall-clock time validation began.
    pub started_at: DateTime<Utc>,
    /// Wall-clock time validation took.
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
    /// Format-specific metadata (EPUB: manifest/spine counts, accessibility score; PDF: version,
    /// object count).
    #[serde(default)]
    pub metadata: BTreeMap<String, DetailValue>,
}

impl ValidationReport {
    /// All findings across all three severities, in bucket order (errors, warnings, info).
    pub fn all_findings(&self) -> impl Iterator<Item = &Finding> {
        self.errors.iter().chain(&self.warnings).chain(&self.info)
    }

    /// Total number of findings across all severities.
    pub fn finding_count(&self) -> usize {
        self.errors.len() + self.warnings.len() + self.info.len()
    }

    /// The file path as a `&Path`, for callers that don't need ownership.
    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_nanos())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = u128::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos.min(u64::MAX as u128) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_error_above_warning_above_info() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn is_valid_tracks_error_bucket_only() {
        let mut sink = FindingSink::new();
        sink.emit("EPUB-OPF-005", "missing dcterms:modified");
        sink.emit("EPUB-NAV-004", "dangling internal link");
        let report = sink.into_report(
            "book.epub".into(),
            FileType::Epub,
            Utc::now(),
            Duration::from_millis(1),
            BTreeMap::new(),
        );
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn findings_partition_into_exactly_one_bucket() {
        let mut sink = FindingSink::new();
        sink.emit("EPUB-CONTAINER-002", "bad mimetype");
        sink.emit("EPUB-A11Y-006", "empty alt not asserted decorative");
        let report = sink.into_report(
            "book.epub".into(),
            FileType::Epub,
            Utc::now(),
            Duration::ZERO,
            BTreeMap::new(),
        );
        let codes: Vec<_> = report.all_findings().map(|f| f.code.as_str()).collect();
        assert_eq!(codes.len(), 2);
        assert_eq!(report.finding_count(), 2);
    }
}
