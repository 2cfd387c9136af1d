//! EPUB content document validator (C5, content half): XHTML well-formedness rules.

use crate::diagnostics::{FindingSink, Location};
use crate::epub::consts::XHTML_NAMESPACE;
use crate::epub::xml::{self, Element};

/// Parse and validate one XHTML content document, returning its root for reuse by the
/// accessibility scorer.
pub fn validate(bytes: &[u8], path: &str, has_scripted_property: bool, sink: &mut FindingSink) -> Option<Element> {
    if !has_doctype(bytes) {
        sink.emit_at(
            "EPUB-CONTENT-002",
            "content document has no DOCTYPE declaration",
            Location::in_file(path),
        );
    }

    if let Err(error) = std::str::from_utf8(bytes) {
        sink.emit_at(
            "EPUB-CONTENT-007",
            format!("content document's declared encoding could not be parsed: {error}"),
            Location::in_file(path),
        );
        return None;
    }

    let root = match xml::parse(bytes) {
        Ok(root) => root,
        Err(error) => {
            sink.emit_at(
                "EPUB-CONTENT-001",
                format!("content document is not well-formed XHTML: {error}"),
                Location::in_file(path),
            );
            return None;
        }
    };

    if root.local_name() != "html" {
        sink.emit_at("EPUB-CONTENT-004", "content document has no html element", Location::in_file(path));
        return Some(root);
    }

    let declares_xhtml_ns = root
        .attributes
        .iter()
        .any(|(key, value)| (key == "xmlns" || key.starts_with("xmlns:")) && value == XHTML_NAMESPACE);
    if !declares_xhtml_ns {
        sink.emit_at(
            "EPUB-CONTENT-003",
            "content document is not declared in the XHTML namespace",
            Location::in_file(path),
        );
    }

    if root.find("head").is_none() {
        sink.emit_at("EPUB-CONTENT-005", "content document has no head element", Location::in_file(path));
    }
    if root.find("body").is_none() {
        sink.emit_at("EPUB-CONTENT-006", "content document has no body element", Location::in_file(path));
    }

    if !root.find_all("script").is_empty() && !has_scripted_property {
        sink.emit_at(
            "EPUB-CONTENT-008",
            "script element present without the manifest declaring the 'scripted' property",
            Location::in_file(path),
        );
    }

    Some(root)
}

fn has_doctype(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    text.to_ascii_uppercase().contains("<!DOCTYPE")
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONTENT: &str = r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>T</title></head><body><p>Hi</p></body></html>"#;

    #[test]
    fn accepts_well_formed_content_document() {
        let mut sink = FindingSink::new();
        assert!(validate(VALID_CONTENT.as_bytes(), "OEBPS/c1.xhtml", false, &mut sink).is_some());
        assert!(!sink.has_errors());
        assert!(sink.warnings().is_empty());
    }

    #[test]
    fn flags_missing_doctype() {
        let doc = VALID_CONTENT.replace("<!DOCTYPE html>\n", "");
        let mut sink = FindingSink::new();
        validate(doc.as_bytes(), "OEBPS/c1.xhtml", false, &mut sink);
        assert!(sink.warnings().iter().any(|f| f.code == "EPUB-CONTENT-002"));
    }

    #[test]
    fn flags_script_without_scripted_property() {
        let doc = VALID_CONTENT.replace("<p>Hi</p>", "<p>Hi</p><script>1</script>");
        let mut sink = FindingSink::new();
        validate(doc.as_bytes(), "OEBPS/c1.xhtml", false, &mut sink);
        assert!(sink.warnings().iter().any(|f| f.code == "EPUB-CONTENT-008"));
    }

    #[test]
    fn script_with_scripted_property_is_allowed() {
        let doc = VALID_CONTENT.replace("<p>Hi</p>", "<p>Hi</p><script>1</script>");
        let mut sink = FindingSink::new();
        validate(doc.as_bytes(), "OEBPS/c1.xhtml", true, &mut sink);
        assert!(sink.warnings().is_empty());
    }
}
