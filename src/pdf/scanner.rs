//! PDF structural scanner (C7): byte-level header/xref/trailer/catalog checks.
//!
//! Operates on the complete file bytes, never an external PDF library: the format is simple
//! enough at the structural level (as opposed to content-stream/font level, which is explicitly
//! out of scope) that a hand-rolled byte scanner is the appropriate tool, mirroring how the
//! container reader treats EPUB as "ZIP plus a few fixed rules" rather than reaching for a
//! general document-object model.

use std::collections::BTreeMap;

use crate::diagnostics::{DetailValue, FindingSink, Location};
use crate::pdf::bytes;

const SUPPORTED_VERSIONS: [&str; 8] = ["1.0", "1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7"];
const SWEEP_WINDOW: usize = 1024;

/// One parsed cross-reference entry.
#[derive(Clone, Copy, Debug)]
struct XrefEntry {
    object_number: u64,
    offset: u64,
    in_use: bool,
}

/// Metadata the scanner recovers for the report, regardless of how many findings were emitted.
#[derive(Clone, Debug, Default)]
pub struct ScanInfo {
    pub version: Option<String>,
    pub object_count: usize,
    pub encrypted: bool,
}

impl From<&ScanInfo> for BTreeMap<String, DetailValue> {
    fn from(info: &ScanInfo) -> Self {
        let mut map = BTreeMap::new();
        if let Some(version) = &info.version {
            map.insert("pdf_version".to_owned(), DetailValue::from(version.as_str()));
        }
        map.insert("object_count".to_owned(), DetailValue::from(info.object_count));
        map.insert("encrypted".to_owned(), DetailValue::from(info.encrypted));
        map
    }
}

/// Run the full scan pipeline against the raw bytes of a PDF file.
pub fn validate(bytes_in: &[u8], sink: &mut FindingSink) -> ScanInfo {
    let mut info = ScanInfo::default();

    let Some(version) = scan_header(bytes_in, sink) else {
        return info;
    };
    info.version = Some(version);

    if !scan_eof(bytes_in, sink) {
        return info;
    }

    let Some(startxref) = scan_startxref(bytes_in, sink) else {
        return info;
    };

    let Some(entries) = parse_xref_table(bytes_in, startxref, sink) else {
        return info;
    };
    info.object_count = entries.len();

    let Some(trailer) = parse_trailer(bytes_in, startxref, sink) else {
        return info;
    };

    info.encrypted = trailer.contains_key("Encrypt");
    if info.encrypted {
        sink.emit_at(
            "PDF-STRUCTURE-013",
            "document is encrypted; deep object inspection was skipped",
            Location::at_offset(startxref as u64),
        );
        return info;
    }

    validate_catalog(bytes_in, &trailer, &entries, sink);
    validate_object_syntax(bytes_in, sink);

    info
}

fn scan_header(bytes_in: &[u8], sink: &mut FindingSink) -> Option<String> {
    let window = &bytes_in[..bytes_in.len().min(SWEEP_WINDOW)];
    let Some(marker) = bytes::find(window, b"%PDF-") else {
        sink.emit_at("PDF-HEADER-001", "no %PDF-x.y header found in the first 1024 bytes", Location::at_offset(0));
        return None;
    };

    let version_start = marker + b"%PDF-".len();
    let version_end = window[version_start..]
        .iter()
        .position(|b| !(b.is_ascii_digit() || *b == b'.'))
        .map(|i| version_start + i)
        .unwrap_or(window.len());
    let version = String::from_utf8_lossy(&window[version_start..version_end]).into_owned();

    if version.is_empty() {
        sink.emit_at(
            "PDF-HEADER-001",
            "malformed %PDF-x.y header",
            Location::at_offset(marker as u64),
        );
        return None;
    }

    if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
        sink.emit_at(
            "PDF-HEADER-002",
            format!("PDF version {version} is not in the supported 1.0-1.7 range"),
            Location::at_offset(marker as u64),
        );
    }

    Some(version)
}

fn scan_eof(bytes_in: &[u8], sink: &mut FindingSink) -> bool {
    let start = bytes_in.len().saturating_sub(SWEEP_WINDOW);
    let window = &bytes_in[start..];
    if bytes::find(window, b"%%EOF").is_none() {
        sink.emit_at(
            "PDF-TRAILER-003",
            "no %%EOF marker found in the last 1024 bytes",
            Location::at_offset(bytes_in.len() as u64),
        );
        return false;
    }
    true
}

fn scan_startxref(bytes_in: &[u8], sink: &mut FindingSink) -> Option<usize> {
    let Some(marker) = bytes::rfind(bytes_in, b"startxref") else {
        sink.emit_at("PDF-TRAILER-001", "startxref keyword not found", Location::at_offset(bytes_in.len() as u64));
        return None;
    };

    let digits_start = bytes::skip_whitespace(bytes_in, marker + b"startxref".len());
    match bytes::parse_decimal_at(bytes_in, digits_start) {
        Some((offset, _)) if (offset as usize) < bytes_in.len() => Some(offset as usize),
        _ => {
            sink.emit_at(
                "PDF-TRAILER-001",
                "startxref offset is missing or not numeric",
                Location::at_offset(marker as u64),
            );
            None
        }
    }
}

fn parse_xref_table(bytes_in: &[u8], start: usize, sink: &mut FindingSink) -> Option<Vec<XrefEntry>> {
    let region_end = bytes::find(&bytes_in[start..], b"trailer").map(|p| p + start).unwrap_or(bytes_in.len());
    let region = String::from_utf8_lossy(&bytes_in[start..region_end]);
    let mut lines = region.lines().map(str::trim).filter(|line| !line.is_empty());

    match lines.next() {
        Some("xref") => {}
        _ => {
            sink.emit_at("PDF-XREF-001", "cross-reference table has no 'xref' header", Location::at_offset(start as u64));
            return None;
        }
    }

    let mut entries = Vec::new();
    let mut malformed = false;
    let mut header = lines.next();
    while let Some(subsection_header) = header {
        let mut parts = subsection_header.split_whitespace();
        let (Some(first_str), Some(count_str)) = (parts.next(), parts.next()) else {
            malformed = true;
            break;
        };
        let (Ok(first), Ok(count)) = (first_str.parse::<u64>(), count_str.parse::<u64>()) else {
            malformed = true;
            break;
        };

        for index in 0..count {
            let Some(entry_line) = lines.next() else {
                malformed = true;
                break;
            };
            let mut tokens = entry_line.split_whitespace();
            let (Some(offset_str), Some(_generation_str), Some(flag_str)) =
                (tokens.next(), tokens.next(), tokens.next())
            else {
                malformed = true;
                continue;
            };
            let Ok(offset) = offset_str.parse::<u64>() else {
                malformed = true;
                continue;
            };
            entries.push(XrefEntry { object_number: first + index, offset, in_use: flag_str == "n" });
        }
        header = lines.next();
    }

    if malformed && entries.is_empty() {
        sink.emit_at("PDF-XREF-001", "cross-reference table is malformed", Location::at_offset(start as u64));
        return None;
    }

    if entries.is_empty() {
        sink.emit_at("PDF-XREF-002", "cross-reference table has no entries", Location::at_offset(start as u64));
        return None;
    }

    let mut in_use_offsets: Vec<u64> = entries.iter().filter(|e| e.in_use).map(|e| e.offset).collect();
    in_use_offsets.sort_unstable();
    if in_use_offsets.windows(2).any(|pair| pair[0] == pair[1]) {
        sink.emit_at(
            "PDF-XREF-003",
            "two in-use cross-reference entries claim overlapping byte ranges",
            Location::at_offset(start as u64),
        );
    }

    Some(entries)
}

fn parse_trailer(bytes_in: &[u8], xref_start: usize, sink: &mut FindingSink) -> Option<BTreeMap<String, String>> {
    let Some(trailer_keyword) = bytes::find(&bytes_in[xref_start..], b"trailer").map(|p| p + xref_start) else {
        sink.emit_at("PDF-TRAILER-002", "no trailer dictionary found after the xref table", Location::at_offset(xref_start as u64));
        return None;
    };

    let Some(dict_text) = extract_dictionary(bytes_in, trailer_keyword) else {
        sink.emit_at(
            "PDF-TRAILER-002",
            "trailer dictionary could not be parsed",
            Location::at_offset(trailer_keyword as u64),
        );
        return None;
    };

    let entries = parse_dict_entries(&dict_text);

    if !entries.contains_key("Root") {
        sink.emit_at(
            "PDF-CATALOG-001",
            "trailer has no /Root reference to a catalog object",
            Location::at_offset(trailer_keyword as u64),
        );
    }

    Some(entries)
}

/// Extract the text between the first `<<` at or after `start` and its matching `>>`.
fn extract_dictionary(bytes_in: &[u8], start: usize) -> Option<String> {
    let (open, close) = bytes::dict_bounds(bytes_in, start)?;
    Some(String::from_utf8_lossy(&bytes_in[open..close]).into_owned())
}

/// A forgiving flat-dictionary tokenizer: splits on `/Name` boundaries and takes everything up
/// to the next name (or the end of the dictionary) as that key's raw value text.
fn parse_dict_entries(dict_text: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    let mut rest = dict_text;
    while let Some(slash) = rest.find('/') {
        rest = &rest[slash + 1..];
        let key_end = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '<' || c == '[' || c == '>')
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_owned();
        let next_slash = rest[key_end..].find('/').map(|i| i + key_end).unwrap_or(rest.len());
        let value = rest[key_end..next_slash].trim().to_owned();
        if !key.is_empty() {
            entries.insert(key, value);
        }
        rest = &rest[next_slash..];
    }
    entries
}

fn validate_catalog(
    bytes_in: &[u8],
    trailer: &BTreeMap<String, String>,
    entries: &[XrefEntry],
    sink: &mut FindingSink,
) {
    let Some(root_value) = trailer.get("Root") else {
        return;
    };
    let Some(object_number) = root_value.split_whitespace().next().and_then(|s| s.parse::<u64>().ok()) else {
        sink.emit_at("PDF-CATALOG-001", "/Root value is not a valid indirect reference", Location::at_offset(0));
        return;
    };

    let Some(entry) = entries.iter().find(|e| e.object_number == object_number && e.in_use) else {
        sink.emit_at(
            "PDF-CATALOG-001",
            format!("/Root references object {object_number}, which has no in-use xref entry"),
            Location::at_offset(0),
        );
        return;
    };

    let offset = entry.offset as usize;
    if offset >= bytes_in.len() {
        sink.emit_at("PDF-CATALOG-001", "/Root object offset is out of bounds", Location::at_offset(entry.offset));
        return;
    }

    let Some(dict_text) = extract_dictionary(bytes_in, offset) else {
        sink.emit_at("PDF-CATALOG-002", "catalog object has no readable dictionary", Location::at_offset(entry.offset));
        return;
    };
    let catalog = parse_dict_entries(&dict_text);

    if catalog.get("Type").map(|t| t.trim()) != Some("Catalog") {
        sink.emit_at("PDF-CATALOG-002", "catalog object has no /Type /Catalog", Location::at_offset(entry.offset));
    }
    if !catalog.contains_key("Pages") {
        sink.emit_at("PDF-CATALOG-003", "catalog object has no /Pages entry", Location::at_offset(entry.offset));
    }
}

fn validate_object_syntax(bytes_in: &[u8], sink: &mut FindingSink) {
    let opens = bytes::count(bytes_in, b"<<");
    let closes = bytes::count(bytes_in, b">>");
    if opens != closes {
        sink.emit_at(
            "PDF-STRUCTURE-012",
            format!("unbalanced dictionary delimiters: {opens} '<<' vs {closes} '>>'"),
            Location::at_offset(0),
        );
        return;
    }

    let mut search_from = 0;
    while let Some(relative) = bytes::find(&bytes_in[search_from..], b"stream") {
        let stream_keyword = search_from + relative;
        let Some(dict_text) = dict_before(bytes_in, stream_keyword) else {
            search_from = stream_keyword + b"stream".len();
            continue;
        };
        let declared = parse_dict_entries(&dict_text).get("Length").and_then(|v| v.trim().parse::<usize>().ok());

        if let Some(declared_length) = declared {
            let data_start = bytes::skip_whitespace(bytes_in, stream_keyword + b"stream".len());
            if let Some(endstream_relative) = bytes::find(&bytes_in[data_start..], b"endstream") {
                let actual_length = endstream_relative.saturating_sub(
                    bytes_in[data_start..data_start + endstream_relative]
                        .iter()
                        .rev()
                        .take_while(|b| b.is_ascii_whitespace())
                        .count(),
                );
                if actual_length != declared_length {
                    sink.emit_at(
                        "PDF-STRUCTURE-012",
                        format!("stream length mismatch: declared {declared_length}, actual {actual_length}"),
                        Location::at_offset(stream_keyword as u64),
                    );
                }
            }
        }

        search_from = stream_keyword + b"stream".len();
    }
}

/// The dictionary text immediately preceding a `stream` keyword, if one is present.
fn dict_before(bytes_in: &[u8], stream_keyword: usize) -> Option<String> {
    let window_start = stream_keyword.saturating_sub(2048);
    let close = bytes::rfind(&bytes_in[window_start..stream_keyword], b">>")? + window_start;
    let open = bytes::rfind(&bytes_in[window_start..close], b"<<")? + window_start;
    Some(String::from_utf8_lossy(&bytes_in[open..close + 2]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn accepts_well_formed_minimal_pdf() {
        let pdf = minimal_pdf();
        let mut sink = FindingSink::new();
        let info = validate(&pdf, &mut sink);
        assert!(!sink.has_errors(), "unexpected errors: {:?}", sink.errors());
        assert_eq!(info.version.as_deref(), Some("1.4"));
        assert_eq!(info.object_count, 3);
    }

    #[test]
    fn flags_missing_eof_marker() {
        let mut pdf = minimal_pdf();
        let len = pdf.len();
        pdf.truncate(len - b"%%EOF\n".len());
        let mut sink = FindingSink::new();
        validate(&pdf, &mut sink);
        assert!(sink.errors().iter().any(|f| f.code == "PDF-TRAILER-003"));
    }

    #[test]
    fn flags_unsupported_version() {
        let mut pdf = minimal_pdf();
        pdf[5..8].copy_from_slice(b"2.0");
        let mut sink = FindingSink::new();
        let info = validate(&pdf, &mut sink);
        assert!(sink.errors().iter().any(|f| f.code == "PDF-HEADER-002"));
        assert_eq!(info.version.as_deref(), Some("2.0"));
    }
}
