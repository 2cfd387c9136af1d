//! EPUB navigation document validator (C5, nav half).

use std::collections::HashSet;

use crate::diagnostics::{FindingSink, Location};
use crate::epub::consts::NAV_PROPERTY_TOC;
use crate::epub::xml::{self, Element};

/// Parse and validate a navigation document, returning its root element for the accessibility
/// scorer and the repair planner to reuse (parsing twice would double the findings).
pub fn validate(bytes: &[u8], path: &str, sink: &mut FindingSink) -> Option<Element> {
    let root = match xml::parse(bytes) {
        Ok(root) => root,
        Err(error) => {
            sink.emit_at(
                "EPUB-NAV-001",
                format!("navigation document is not well-formed XML: {error}"),
                Location::in_file(path),
            );
            return None;
        }
    };

    let navs = root.find_all("nav");
    if navs.is_empty() {
        sink.emit_at("EPUB-NAV-002", "navigation document has no nav element", Location::in_file(path));
        return Some(root);
    }

    let has_toc = navs.iter().any(|nav| is_toc_nav(nav));
    if !has_toc {
        sink.emit_at("EPUB-NAV-003", "navigation document has no toc nav", Location::in_file(path));
    }

    validate_internal_links(&root, path, sink);
    validate_landmarks(&navs, path, sink);
    validate_duplicate_ids(&root, path, sink);

    Some(root)
}

/// Whether a parsed navigation document has at least one `toc` nav.
///
/// Exposed separately from [`validate`] so the accessibility scorer's `tableOfContents` feature
/// flag can reuse the already-parsed tree instead of re-parsing the nav document.
pub fn document_has_toc(root: &Element) -> bool {
    root.find_all("nav").into_iter().any(is_toc_nav)
}

fn is_toc_nav(nav: &Element) -> bool {
    nav.attributes
        .iter()
        .find(|(key, _)| key.rsplit(':').next() == Some("type"))
        .is_some_and(|(_, value)| value.split_whitespace().any(|token| token == NAV_PROPERTY_TOC))
}

fn is_landmarks_nav(nav: &Element) -> bool {
    nav.attributes
        .iter()
        .find(|(key, _)| key.rsplit(':').next() == Some("type"))
        .is_some_and(|(_, value)| value.split_whitespace().any(|token| token == "landmarks"))
}

fn validate_internal_links(root: &Element, path: &str, sink: &mut FindingSink) {
    let ids: HashSet<&str> = root.descendants().iter().filter_map(|e| e.attr("id")).collect();

    for anchor in root.find_all("a") {
        let Some(href) = anchor.attr("href") else { continue };
        let Some(fragment) = href.strip_prefix('#') else { continue };
        if !fragment.is_empty() && !ids.contains(fragment) {
            sink.emit_at(
                "EPUB-NAV-004",
                format!("internal link '#{fragment}' does not resolve to any element id"),
                Location::at_selector(path, format!("//a[@href='#{fragment}']")),
            );
        }
    }
}

fn validate_landmarks(navs: &[&Element], path: &str, sink: &mut FindingSink) {
    for nav in navs.iter().filter(|nav| is_landmarks_nav(nav)) {
        let has_ol_li = nav.find("ol").is_some_and(|ol| ol.child_elements().any(|e| e.local_name() == "li"));
        if !has_ol_li {
            sink.emit_at(
                "EPUB-NAV-005",
                "landmarks nav has no ordered list of entries",
                Location::in_file(path),
            );
        }
    }
}

fn validate_duplicate_ids(root: &Element, path: &str, sink: &mut FindingSink) {
    let mut seen = HashSet::new();
    for element in root.descendants() {
        if let Some(id) = element.attr("id") {
            if !id.is_empty() && !seen.insert(id) {
                sink.emit_at(
                    "EPUB-NAV-006",
                    format!("duplicate id '{id}' in the navigation document"),
                    Location::at_selector(path, format!("//*[@id='{id}']")),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_NAV: &str = r#"<html xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="toc"><ol><li><a href="#ch1">Chapter 1</a></li></ol></nav>
  <section id="ch1"></section>
</body>
</html>"#;

    #[test]
    fn accepts_document_with_toc_nav() {
        let mut sink = FindingSink::new();
        assert!(validate(VALID_NAV.as_bytes(), "OEBPS/nav.xhtml", &mut sink).is_some());
        assert!(!sink.has_errors());
        assert!(sink.warnings().is_empty());
    }

    #[test]
    fn flags_missing_nav_element() {
        let mut sink = FindingSink::new();
        validate(b"<html><body><p>no nav here</p></body></html>", "OEBPS/nav.xhtml", &mut sink);
        assert!(sink.errors().iter().any(|f| f.code == "EPUB-NAV-002"));
    }

    #[test]
    fn flags_dangling_internal_link() {
        let doc = VALID_NAV.replace("#ch1", "#missing");
        let mut sink = FindingSink::new();
        validate(doc.as_bytes(), "OEBPS/nav.xhtml", &mut sink);
        assert!(sink.warnings().iter().any(|f| f.code == "EPUB-NAV-004"));
    }
}
