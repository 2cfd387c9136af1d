//! Reporter adapters (C10): render a [`ValidationReport`] (or a batch of them) as JSON, plain
//! text, or Markdown.
//!
//! Each format is an independent, from-scratch implementation of the [`Reporter`] trait: there
//! is deliberately no shared base struct doing the real work behind a thin facade. JSON, text, and
//! Markdown readers want fundamentally different things from the same data, and sharing an
//! implementation here would mean contorting one format to fit another's structure.

pub mod json;
pub mod markdown;
pub mod text;

pub use json::JsonReporter;
pub use markdown::MarkdownReporter;
pub use text::TextReporter;

use std::io;

use crate::diagnostics::{Finding, Severity, ValidationReport};

/// Renders a [`ValidationReport`] into a specific textual format.
pub trait Reporter {
    /// Render a single report to a `String`.
    fn format(&self, report: &ValidationReport, options: &ReportOptions) -> String;

    /// Render several reports plus an aggregate summary to a `String`.
    fn format_many(&self, reports: &[ValidationReport], options: &ReportOptions) -> String {
        reports.iter().map(|report| self.format(report, options)).collect::<Vec<_>>().join("\n")
    }

    /// Render and write a single report directly to `writer`.
    fn write(&self, report: &ValidationReport, writer: &mut dyn io::Write, options: &ReportOptions) -> io::Result<()> {
        writer.write_all(self.format(report, options).as_bytes())
    }
}

/// Caller-facing knobs shared by every [`Reporter`] implementation.
#[derive(Clone, Debug)]
pub struct ReportOptions {
    /// Include warning-severity findings.
    pub include_warnings: bool,
    /// Include info-severity findings.
    pub include_info: bool,
    /// Include extra detail (e.g. elapsed time, full detail maps) where the format supports it.
    pub verbose: bool,
    /// Whether the text format may emit ANSI color escapes.
    pub color_enabled: bool,
    /// Cap the number of error-severity findings rendered, for very noisy documents.
    pub max_errors: Option<usize>,
    /// Which findings to include, beyond the severity-bucket toggles above.
    pub filter: ReportFilter,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_warnings: true,
            include_info: true,
            verbose: false,
            color_enabled: false,
            max_errors: None,
            filter: ReportFilter::default(),
        }
    }
}

/// Narrows which findings a [`Reporter`] renders, independent of the severity-bucket toggles on
/// [`ReportOptions`].
#[derive(Clone, Debug, Default)]
pub struct ReportFilter {
    /// If set, only findings with one of these severities are shown.
    pub severities: Option<Vec<Severity>>,
    /// If set, only findings at or above this severity are shown.
    pub min_severity: Option<Severity>,
    /// If set, only findings whose code's category segment (e.g. `OPF` in `EPUB-OPF-004`)
    /// matches exactly are shown.
    pub category: Option<String>,
    /// If set, only findings whose code starts with this prefix are shown.
    pub code_prefix: Option<String>,
}

impl ReportFilter {
    /// Whether `finding` passes every configured constraint.
    pub fn matches(&self, finding: &Finding) -> bool {
        if let Some(severities) = &self.severities {
            if !severities.contains(&finding.severity) {
                return false;
            }
        }
        if let Some(min_severity) = self.min_severity {
            if finding.severity < min_severity {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if code_category(&finding.code) != category.as_str() {
                return false;
            }
        }
        if let Some(prefix) = &self.code_prefix {
            if !finding.code.starts_with(prefix.as_str()) {
                return false;
            }
        }
        true
    }
}

/// The `CATEGORY` segment of a `FORMAT-CATEGORY-NNN` code.
fn code_category(code: &str) -> &str {
    code.split('-').nth(1).unwrap_or("")
}

/// Findings split into (errors, warnings, info) after filtering and severity-toggle selection,
/// with `max_errors` applied to the error bucket.
pub(crate) fn selected_findings<'a>(
    report: &'a ValidationReport,
    options: &ReportOptions,
) -> (Vec<&'a Finding>, Vec<&'a Finding>, Vec<&'a Finding>) {
    let mut errors: Vec<&Finding> = report.errors.iter().filter(|finding| options.filter.matches(finding)).collect();
    if let Some(max_errors) = options.max_errors {
        errors.truncate(max_errors);
    }

    let warnings = if options.include_warnings {
        report.warnings.iter().filter(|finding| options.filter.matches(finding)).collect()
    } else {
        Vec::new()
    };

    let info = if options.include_info {
        report.info.iter().filter(|finding| options.filter.matches(finding)).collect()
    } else {
        Vec::new()
    };

    (errors, warnings, info)
}

/// Aggregate counters across several reports, used by each format's `format_many`.
#[derive(Copy, Clone, Debug, Default, serde::Serialize)]
pub struct ReportSummary {
    /// Number of reports rendered.
    pub total_files: usize,
    /// Number of reports with `is_valid == true`.
    pub valid_files: usize,
    /// Total error-severity findings across all reports.
    pub total_errors: usize,
    /// Total warning-severity findings across all reports.
    pub total_warnings: usize,
    /// Total info-severity findings across all reports.
    pub total_info: usize,
}

pub(crate) fn aggregate_summary(reports: &[ValidationReport]) -> ReportSummary {
    let mut summary = ReportSummary { total_files: reports.len(), ..ReportSummary::default() };
    for report in reports {
        if report.is_valid {
            summary.valid_files += 1;
        }
        summary.total_errors += report.errors.len();
        summary.total_warnings += report.warnings.len();
        summary.total_info += report.info.len();
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::FindingSink;

    #[test]
    fn filter_matches_min_severity() {
        let mut sink = FindingSink::new();
        sink.emit("EPUB-NAV-004", "dangling link");
        let finding = sink.warnings()[0].clone();

        let filter = ReportFilter { min_severity: Some(Severity::Error), ..ReportFilter::default() };
        assert!(!filter.matches(&finding));

        let filter = ReportFilter { min_severity: Some(Severity::Info), ..ReportFilter::default() };
        assert!(filter.matches(&finding));
    }

    #[test]
    fn filter_matches_category() {
        let mut sink = FindingSink::new();
        sink.emit("EPUB-OPF-005", "missing dcterms:modified");
        let finding = sink.errors()[0].clone();

        let filter = ReportFilter { category: Some("OPF".to_owned()), ..ReportFilter::default() };
        assert!(filter.matches(&finding));

        let filter = ReportFilter { category: Some("NAV".to_owned()), ..ReportFilter::default() };
        assert!(!filter.matches(&finding));
    }
}
