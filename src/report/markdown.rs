//! Markdown report adapter: one H1 per file, H2 per severity section, a table per non-empty
//! section; a straightforward projection, same spirit as the text adapter but table-shaped.

use std::fmt::Write as _;

use crate::diagnostics::{Finding, Location, ValidationReport};
use crate::report::{aggregate_summary, selected_findings, Reporter, ReportOptions};

/// Renders reports as Markdown.
pub struct MarkdownReporter;

impl Reporter for MarkdownReporter {
    fn format(&self, report: &ValidationReport, options: &ReportOptions) -> String {
        let (errors, warnings, info) = selected_findings(report, options);
        let mut out = String::new();

        let _ = writeln!(out, "# {}", report.file_path.display());
        let _ = writeln!(out);
        let _ = writeln!(out, "**Type:** {}  ", report.file_type);
        let _ = writeln!(out, "**Valid:** {}  ", report.is_valid);
        if options.verbose {
            let _ = writeln!(out, "**Duration:** {:?}  ", report.duration);
        }
        let _ = writeln!(out);

        write_section(&mut out, "Errors", &errors);
        if options.include_warnings {
            write_section(&mut out, "Warnings", &warnings);
        }
        if options.include_info {
            write_section(&mut out, "Info", &info);
        }

        out
    }

    fn format_many(&self, reports: &[ValidationReport], options: &ReportOptions) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Validation Report");
        let _ = writeln!(out);
        for report in reports {
            out.push_str(&self.format(report, options));
        }

        let summary = aggregate_summary(reports);
        let _ = writeln!(out, "## Summary");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Files | Valid | Errors | Warnings | Info |");
        let _ = writeln!(out, "|---|---|---|---|---|");
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            summary.total_files, summary.valid_files, summary.total_errors, summary.total_warnings, summary.total_info
        );
        out
    }
}

fn write_section(out: &mut String, title: &str, findings: &[&Finding]) {
    let _ = writeln!(out, "## {title}");
    let _ = writeln!(out);
    if findings.is_empty() {
        let _ = writeln!(out, "_none_");
        let _ = writeln!(out);
        return;
    }

    let _ = writeln!(out, "| Code | Message | Location |");
    let _ = writeln!(out, "|---|---|---|");
    for finding in findings {
        let _ = writeln!(
            out,
            "| {} | {} | {} |",
            finding.code,
            escape_cell(&finding.message),
            describe_location(finding.location.as_ref())
        );
    }
    let _ = writeln!(out);
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn describe_location(location: Option<&Location>) -> String {
    let Some(location) = location else {
        return String::new();
    };
    let mut parts = Vec::new();
    if let Some(file_path) = &location.file_path {
        parts.push(file_path.clone());
    }
    if let (Some(line), Some(column)) = (location.line, location.column) {
        parts.push(format!("{line}:{column}"));
    } else if let Some(byte_offset) = location.byte_offset {
        parts.push(format!("byte {byte_offset}"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::FindingSink;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn renders_table_row_per_finding() {
        let mut sink = FindingSink::new();
        sink.emit("EPUB-OPF-005", "missing dcterms:modified");
        let report = sink.into_report(
            PathBuf::from("book.epub"),
            crate::diagnostics::FileType::Epub,
            chrono::Utc::now(),
            Duration::ZERO,
            BTreeMap::new(),
        );
        let text = MarkdownReporter.format(&report, &ReportOptions::default());
        assert!(text.contains("## Errors"));
        assert!(text.contains("EPUB-OPF-005"));
    }

    #[test]
    fn empty_section_renders_none_placeholder() {
        let sink = FindingSink::new();
        let report = sink.into_report(
            PathBuf::from("book.epub"),
            crate::diagnostics::FileType::Epub,
            chrono::Utc::now(),
            Duration::ZERO,
            BTreeMap::new(),
        );
        let text = MarkdownReporter.format(&report, &ReportOptions::default());
        assert!(text.contains("_none_"));
    }
}
