//! The code catalog: a single static table of every code this crate's validators may emit.
//!
//! Severity is declared here, once, per code: never inferred ad hoc at the call site that
//! emits a finding (see [`crate::diagnostics::FindingSink::emit`]). Downgrading an error to a
//! warning (or vice versa) is meant to be a deliberate, reviewable change to this table, not a
//! side effect of touching validator logic.
//!
//! The registry is an open set: [`FindingSink::emit`](crate::diagnostics::FindingSink::emit)
//! happily accepts a code this table doesn't know about (for third-party adapters), defaulting
//! it to [`Severity::Warning`]. Every code the core itself emits, however, MUST have an entry
//! here; that invariant is checked by [`tests::every_emitted_code_is_cataloged`].

use crate::diagnostics::Severity;

/// One row of the catalog: `(code, severity, short description)`.
type Entry = (&'static str, Severity, &'static str);

macro_rules! catalog {
    ($($code:literal => $severity:ident, $desc:literal;)+) => {
        const CATALOG: &[Entry] = &[
            $(($code, Severity::$severity, $desc)),+
        ];
    };
}

catalog! {
    // --- EPUB container (C3) ---
    "EPUB-CONTAINER-001" => Error, "source is not a valid ZIP archive";
    "EPUB-CONTAINER-002" => Error, "mimetype entry missing, wrong content, or compressed";
    "EPUB-CONTAINER-003" => Error, "mimetype entry is not the first entry in the archive";
    "EPUB-CONTAINER-004" => Error, "META-INF/container.xml is absent";
    "EPUB-CONTAINER-005" => Error, "META-INF/container.xml is malformed or has no rootfile";

    // --- EPUB package / OPF (C4) ---
    "EPUB-OPF-001" => Error,   "package document is not well-formed XML";
    "EPUB-OPF-002" => Error,   "dc:title is missing or empty";
    "EPUB-OPF-003" => Error,   "dc:identifier is missing or empty";
    "EPUB-OPF-004" => Error,   "dc:language is missing or empty";
    "EPUB-OPF-005" => Error,   "meta[property=dcterms:modified] is missing or empty";
    "EPUB-OPF-006" => Error,   "package unique-identifier does not reference a dc:identifier id";
    "EPUB-OPF-007" => Error,   "manifest element is missing or empty";
    "EPUB-OPF-008" => Error,   "spine element is missing or empty";
    "EPUB-OPF-009" => Error,   "manifest does not have exactly one item with the nav property";
    "EPUB-OPF-010" => Error,   "manifest item is missing id, href, or media-type";
    "EPUB-OPF-011" => Error,   "spine itemref does not resolve to a manifest item id";
    "EPUB-OPF-012" => Warning, "manifest item media-type is not a well-formed MIME type";
    "EPUB-OPF-013" => Warning, "EPUB2 spine has no toc attribute referencing an NCX item";
    "EPUB-OPF-014" => Error,   "duplicate manifest item id";
    "EPUB-OPF-015" => Error,   "referenced package (.opf) file is missing from the container";

    // --- EPUB navigation document (C5) ---
    "EPUB-NAV-001" => Error,   "navigation document is not well-formed XML";
    "EPUB-NAV-002" => Error,   "navigation document has no nav element";
    "EPUB-NAV-003" => Error,   "navigation document has no toc nav";
    "EPUB-NAV-004" => Warning, "navigation document has a dangling internal link";
    "EPUB-NAV-005" => Warning, "landmarks nav is malformed";
    "EPUB-NAV-006" => Warning, "duplicate id attribute within the navigation document";

    // --- EPUB content documents (C5) ---
    "EPUB-CONTENT-001" => Error,   "content document is not well-formed XHTML";
    "EPUB-CONTENT-002" => Warning, "content document has no DOCTYPE declaration";
    "EPUB-CONTENT-003" => Error,   "content document is not in the XHTML namespace";
    "EPUB-CONTENT-004" => Error,   "content document has no html element";
    "EPUB-CONTENT-005" => Error,   "content document has no head element";
    "EPUB-CONTENT-006" => Error,   "content document has no body element";
    "EPUB-CONTENT-007" => Error,   "content document's declared encoding could not be parsed";
    "EPUB-CONTENT-008" => Warning, "script element present without the scripted manifest property";

    // --- EPUB accessibility (C6) ---
    "EPUB-A11Y-001" => Error,   "html element has no lang or xml:lang attribute";
    "EPUB-A11Y-002" => Warning, "lang attribute is not a recognized ISO 639 code";
    "EPUB-A11Y-003" => Warning, "no semantic structuring elements found";
    "EPUB-A11Y-004" => Warning, "first heading in the document is not an h1";
    "EPUB-A11Y-005" => Error,   "img element has no alt attribute";
    "EPUB-A11Y-006" => Info,    "alt is empty but context does not assert the image is decorative";
    "EPUB-A11Y-007" => Error,   "role attribute value is not a recognized ARIA role";
    "EPUB-A11Y-008" => Error,   "aria-* attribute name is not in the WAI-ARIA registry";
    "EPUB-A11Y-009" => Warning, "role requires an accessible label that is missing";
    "EPUB-A11Y-010" => Warning, "positive tabindex overrides natural reading order";
    "EPUB-A11Y-011" => Error,   "data table has no th header cells";
    "EPUB-A11Y-012" => Warning, "th header cell has no scope or id association";
    "EPUB-A11Y-013" => Error,   "form control has no associated label";
    "EPUB-A11Y-014" => Warning, "duplicate id attribute in the content document";
    "EPUB-A11Y-015" => Warning, "media element has no captions or audio description";
    "EPUB-A11Y-016" => Warning, "embedded iframe/object has no title or accessible name";
    "EPUB-A11Y-017" => Info,    "link text is not descriptive out of context";
    "EPUB-A11Y-018" => Warning, "document does not have exactly one main landmark";
    "EPUB-A11Y-019" => Warning, "heading element has empty text content";
    "EPUB-A11Y-020" => Error,   "heading level increases by more than one step";

    // --- PDF structure (C7) ---
    "PDF-HEADER-001" => Error,   "no %PDF-x.y header found in the first 1024 bytes";
    "PDF-HEADER-002" => Error,   "PDF version is not in the supported 1.0-1.7 range";
    "PDF-TRAILER-001" => Error,  "startxref is missing or its offset is not numeric";
    "PDF-TRAILER-002" => Error,  "trailer dictionary could not be parsed";
    "PDF-TRAILER-003" => Error,  "no %%EOF marker found in the last 1024 bytes";
    "PDF-XREF-001" => Error,     "cross-reference table is malformed";
    "PDF-XREF-002" => Error,     "cross-reference table has no entries";
    "PDF-XREF-003" => Warning,   "two in-use cross-reference entries claim overlapping ranges";
    "PDF-CATALOG-001" => Error,  "trailer has no /Root reference to a catalog object";
    "PDF-CATALOG-002" => Error,  "catalog object has no /Type /Catalog";
    "PDF-CATALOG-003" => Error,  "catalog object has no /Pages entry";
    "PDF-STRUCTURE-012" => Warning, "stream length mismatch or unbalanced dictionary delimiters";
    "PDF-STRUCTURE-013" => Info, "document is encrypted; deep object inspection was skipped";
}

/// Look up the catalog severity for a code, if known.
pub fn severity_of(code: &str) -> Option<Severity> {
    CATALOG
        .iter()
        .find(|(known, _, _)| *known == code)
        .map(|(_, severity, _)| *severity)
}

/// Look up the catalog description for a code, if known.
pub fn description_of(code: &str) -> Option<&'static str> {
    CATALOG
        .iter()
        .find(|(known, _, _)| *known == code)
        .map(|(_, _, desc)| desc)
}

/// Iterate the whole catalog, e.g. for `--list-codes`-style CLI introspection.
pub fn all() -> impl Iterator<Item = (&'static str, Severity, &'static str)> {
    CATALOG.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_no_duplicate_codes() {
        let mut codes: Vec<_> = CATALOG.iter().map(|(code, _, _)| *code).collect();
        codes.sort_unstable();
        let before = codes.len();
        codes.dedup();
        assert_eq!(before, codes.len(), "duplicate code in catalog");
    }

    #[test]
    fn known_codes_resolve_severity_and_description() {
        assert_eq!(severity_of("PDF-TRAILER-003"), Some(Severity::Error));
        assert_eq!(severity_of("EPUB-A11Y-006"), Some(Severity::Info));
        assert!(description_of("EPUB-OPF-012").is_some());
        assert_eq!(severity_of("NOT-A-REAL-CODE"), None);
    }
}
