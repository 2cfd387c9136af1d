//! JSON report adapter: a direct, filtered projection of [`ValidationReport`]'s own `Serialize`
//! impl. Timestamps stay ISO-8601 UTC and durations stay integer nanoseconds, matching the
//! diagnostic model's own wire format rather than inventing a second one here.

use crate::report::{aggregate_summary, selected_findings, Reporter, ReportOptions};
use crate::diagnostics::ValidationReport;

/// Renders reports as JSON (compact, or pretty-printed when [`ReportOptions::verbose`] is set).
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn format(&self, report: &ValidationReport, options: &ReportOptions) -> String {
        let (errors, warnings, info) = selected_findings(report, options);
        let value = serde_json::json!({
            "file_path": report.file_path,
            "file_type": report.file_type,
            "is_valid": report.is_valid,
            "errors": errors,
            "warnings": warnings,
            "info": info,
            "started_at": report.started_at,
            "duration_ns": report.duration.as_nanos() as u64,
            "metadata": report.metadata,
        });
        render(&value, options.verbose)
    }

    fn format_many(&self, reports: &[ValidationReport], options: &ReportOptions) -> String {
        let files: Vec<serde_json::Value> = reports
            .iter()
            .map(|report| {
                let (errors, warnings, info) = selected_findings(report, options);
                serde_json::json!({
                    "file_path": report.file_path,
                    "file_type": report.file_type,
                    "is_valid": report.is_valid,
                    "errors": errors,
                    "warnings": warnings,
                    "info": info,
                    "started_at": report.started_at,
                    "duration_ns": report.duration.as_nanos() as u64,
                    "metadata": report.metadata,
                })
            })
            .collect();
        let summary = aggregate_summary(reports);
        let value = serde_json::json!({ "files": files, "summary": summary });
        render(&value, options.verbose)
    }
}

fn render(value: &serde_json::Value, pretty: bool) -> String {
    if pretty {
        serde_json::to_string_pretty(value).unwrap_or_default()
    } else {
        serde_json::to_string(value).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{FileType, FindingSink};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn renders_valid_report_with_no_findings() {
        let sink = FindingSink::new();
        let report =
            sink.into_report(PathBuf::from("book.epub"), FileType::Epub, chrono::Utc::now(), Duration::ZERO, BTreeMap::new());
        let text = JsonReporter.format(&report, &ReportOptions::default());
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["is_valid"], true);
        assert_eq!(value["errors"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn omits_warnings_when_disabled() {
        let mut sink = FindingSink::new();
        sink.emit("EPUB-NAV-004", "dangling link");
        let report =
            sink.into_report(PathBuf::from("book.epub"), FileType::Epub, chrono::Utc::now(), Duration::ZERO, BTreeMap::new());
        let options = ReportOptions { include_warnings: false, ..ReportOptions::default() };
        let text = JsonReporter.format(&report, &options);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["warnings"].as_array().unwrap().len(), 0);
    }
}
