//! Plain-text report adapter: one line per finding, optionally colorized with the same
//! red/yellow/blue severity convention CLI tools in this corpus already use.

use std::fmt::Write as _;

use crate::diagnostics::{Finding, Location, Severity, ValidationReport};
use crate::report::{aggregate_summary, selected_findings, Reporter, ReportOptions};

/// Renders reports as human-readable plain text.
pub struct TextReporter;

impl Reporter for TextReporter {
    fn format(&self, report: &ValidationReport, options: &ReportOptions) -> String {
        let (errors, warnings, info) = selected_findings(report, options);
        let mut out = String::new();

        let _ = writeln!(out, "{} [{}] - {}", report.file_path.display(), report.file_type, status_label(report.is_valid));
        let _ = writeln!(out, "  {} error(s), {} warning(s), {} info", errors.len(), warnings.len(), info.len());

        for finding in errors.iter().chain(&warnings).chain(&info) {
            let _ = writeln!(out, "  {}", render_finding(finding, options.color_enabled));
        }

        if options.verbose {
            let _ = writeln!(out, "  completed in {:?}", report.duration);
        }

        out
    }

    fn format_many(&self, reports: &[ValidationReport], options: &ReportOptions) -> String {
        let mut out = String::new();
        for report in reports {
            out.push_str(&self.format(report, options));
        }
        let summary = aggregate_summary(reports);
        let _ = writeln!(
            out,
            "\n{} file(s), {} valid, {} error(s), {} warning(s), {} info",
            summary.total_files, summary.valid_files, summary.total_errors, summary.total_warnings, summary.total_info
        );
        out
    }
}

fn status_label(is_valid: bool) -> &'static str {
    if is_valid { "valid" } else { "invalid" }
}

fn render_finding(finding: &Finding, color_enabled: bool) -> String {
    let label = colorize(finding.severity, color_enabled);
    let location = finding.location.as_ref().map(|location| format!(" ({})", describe_location(location))).unwrap_or_default();
    format!("[{label}] {}{location}: {}", finding.code, finding.message)
}

fn colorize(severity: Severity, enabled: bool) -> String {
    if !enabled {
        return severity.to_string();
    }
    let code = match severity {
        Severity::Error => "31",
        Severity::Warning => "33",
        Severity::Info => "34",
    };
    format!("\x1b[{code}m{severity}\x1b[0m")
}

fn describe_location(location: &Location) -> String {
    let mut parts = Vec::new();
    if let Some(file_path) = &location.file_path {
        parts.push(file_path.clone());
    }
    if let (Some(line), Some(column)) = (location.line, location.column) {
        parts.push(format!("{line}:{column}"));
    } else if let Some(byte_offset) = location.byte_offset {
        parts.push(format!("byte {byte_offset}"));
    }
    if let Some(selector) = &location.selector {
        parts.push(selector.clone());
    }
    if parts.is_empty() {
        "unknown location".to_owned()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::FindingSink;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn renders_finding_summary_line() {
        let mut sink = FindingSink::new();
        sink.emit_at("EPUB-NAV-004", "dangling internal link", Location::in_file("OEBPS/nav.xhtml"));
        let report =
            sink.into_report(PathBuf::from("book.epub"), crate::diagnostics::FileType::Epub, chrono::Utc::now(), Duration::ZERO, BTreeMap::new());
        let text = TextReporter.format(&report, &ReportOptions::default());
        assert!(text.contains("EPUB-NAV-004"));
        assert!(text.contains("OEBPS/nav.xhtml"));
    }

    #[test]
    fn color_disabled_by_default() {
        let mut sink = FindingSink::new();
        sink.emit("EPUB-NAV-004", "dangling internal link");
        let report =
            sink.into_report(PathBuf::from("book.epub"), crate::diagnostics::FileType::Epub, chrono::Utc::now(), Duration::ZERO, BTreeMap::new());
        let text = TextReporter.format(&report, &ReportOptions::default());
        assert!(!text.contains("\x1b["));
    }
}
