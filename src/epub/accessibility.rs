//! EPUB accessibility scorer (C6): weighted scoring plus EPUB-discovery metadata.
//!
//! Walks a parsed content document once and scores six independent inputs (language, semantic
//! structure, ARIA usage, alt text, heading hierarchy, reading order), emitting one
//! `EPUB-A11Y-*` finding per violation alongside the sub-scores. A handful of additional checks
//! (table headers, form labels, media captions, landmark count, duplicate ids, link text) also
//! emit findings but never change the score.

use std::collections::{BTreeMap, HashSet};

use crate::diagnostics::{DetailValue, FindingSink, Location};
use crate::epub::consts::{
    HEADING_TAGS, KNOWN_ARIA_ATTRIBUTES, KNOWN_ARIA_ROLES, NON_DESCRIPTIVE_LINK_TEXT,
};
use crate::epub::xml::Element;

const HEADING_PENALTY: f64 = 4.0;
const READING_ORDER_PENALTY: f64 = 2.0;
const ARIA_ROLE_PENALTY: f64 = 5.0;
const ARIA_ATTRIBUTE_PENALTY: f64 = 5.0;
const ARIA_LABEL_PENALTY: f64 = 3.0;

const ROLES_REQUIRING_LABEL: [&str; 3] = ["navigation", "region", "form"];

/// A rough ISO 639-1/639-2 allowlist, sufficient to catch obviously-wrong `lang` values without
/// vendoring the full registry.
const ISO_639_CODES: &[&str] = &[
    "aa", "ab", "af", "ak", "am", "ar", "as", "az", "be", "bg", "bn", "bo", "br", "bs", "ca", "co",
    "cs", "cy", "da", "de", "dv", "dz", "el", "en", "eo", "es", "et", "eu", "fa", "fi", "fj", "fo",
    "fr", "fy", "ga", "gd", "gl", "gn", "gu", "ha", "he", "hi", "hr", "ht", "hu", "hy", "ia", "id",
    "ig", "is", "it", "ja", "jv", "ka", "kk", "km", "kn", "ko", "ku", "ky", "la", "lb", "lo", "lt",
    "lv", "mg", "mi", "mk", "ml", "mn", "mr", "ms", "mt", "my", "na", "nb", "ne", "nl", "no", "ny",
    "om", "or", "pa", "pl", "ps", "pt", "qu", "ro", "ru", "rw", "sd", "si", "sk", "sl", "sm", "sn",
    "so", "sq", "sr", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti", "tk", "tl", "tn", "tr",
    "ts", "tt", "ug", "uk", "ur", "uz", "vi", "wo", "xh", "yi", "yo", "za", "zh", "zu", "eng", "fre",
    "ger", "spa", "chi", "jpn", "kor", "rus", "ara",
];

/// The six weighted sub-scores plus the derived tier and discovery metadata.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AccessibilityScore {
    pub language: f64,
    pub semantic: f64,
    pub aria: f64,
    pub alt_text: f64,
    pub headings: f64,
    pub reading_order: f64,
    pub total: f64,
    pub tier: ComplianceTier,
    pub access_modes: Vec<String>,
    pub features: Vec<String>,
    pub conformance: Vec<String>,
    pub summary: String,
}

/// A human-readable classification derived from [`AccessibilityScore::total`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ComplianceTier {
    WcagAa,
    WcagA,
    Partial,
    NonCompliant,
}

impl serde::Serialize for ComplianceTier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ComplianceTier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "WCAG 2.1 AA" => Ok(ComplianceTier::WcagAa),
            "WCAG 2.1 A" => Ok(ComplianceTier::WcagA),
            "Partial" => Ok(ComplianceTier::Partial),
            "Non-compliant" => Ok(ComplianceTier::NonCompliant),
            other => Err(serde::de::Error::custom(format!("unknown compliance tier: {other}"))),
        }
    }
}

impl ComplianceTier {
    fn from_total(total: f64) -> Self {
        if total >= 90.0 {
            ComplianceTier::WcagAa
        } else if total >= 80.0 {
            ComplianceTier::WcagA
        } else if total >= 60.0 {
            ComplianceTier::Partial
        } else {
            ComplianceTier::NonCompliant
        }
    }
}

impl std::fmt::Display for ComplianceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ComplianceTier::WcagAa => "WCAG 2.1 AA",
            ComplianceTier::WcagA => "WCAG 2.1 A",
            ComplianceTier::Partial => "Partial",
            ComplianceTier::NonCompliant => "Non-compliant",
        })
    }
}

impl From<&AccessibilityScore> for DetailValue {
    fn from(score: &AccessibilityScore) -> Self {
        DetailValue::Map(BTreeMap::from([
            ("language".to_owned(), DetailValue::from(score.language)),
            ("semantic".to_owned(), DetailValue::from(score.semantic)),
            ("aria".to_owned(), DetailValue::from(score.aria)),
            ("alt_text".to_owned(), DetailValue::from(score.alt_text)),
            ("headings".to_owned(), DetailValue::from(score.headings)),
            ("reading_order".to_owned(), DetailValue::from(score.reading_order)),
            ("total".to_owned(), DetailValue::from(score.total)),
            ("tier".to_owned(), DetailValue::from(score.tier.to_string())),
            (
                "access_modes".to_owned(),
                DetailValue::from(score.access_modes.iter().map(|s| DetailValue::from(s.as_str())).collect::<Vec<_>>()),
            ),
            (
                "features".to_owned(),
                DetailValue::from(score.features.iter().map(|s| DetailValue::from(s.as_str())).collect::<Vec<_>>()),
            ),
            (
                "conformance".to_owned(),
                DetailValue::from(score.conformance.iter().map(|s| DetailValue::from(s.as_str())).collect::<Vec<_>>()),
            ),
            ("summary".to_owned(), DetailValue::from(score.summary.clone())),
        ]))
    }
}

/// Score `root` (an already-parsed content document) and emit every `EPUB-A11Y-*` finding.
pub fn validate(root: &Element, path: &str, nav_has_toc: bool, sink: &mut FindingSink) -> AccessibilityScore {
    let language = score_language(root, path, sink);
    let semantic = score_semantic(root, path, sink);
    let aria = score_aria(root, path, sink);
    let (alt_text, any_image, alt_complete) = score_alt_text(root, path, sink);
    let headings = score_headings(root, path, sink);
    let reading_order = score_reading_order(root, path, sink);

    validate_table_headers(root, path, sink);
    validate_form_labels(root, path, sink);
    validate_media_captions(root, path, sink);
    validate_main_landmark(root, path, sink);
    validate_duplicate_ids(root, path, sink);
    validate_link_text(root, path, sink);

    let total = (language + semantic + aria + alt_text + headings + reading_order).clamp(0.0, 100.0);
    let tier = ComplianceTier::from_total(total);

    let any_audio_or_video = !root.find_all("audio").is_empty() || !root.find_all("video").is_empty();
    let has_headings = heading_elements(root).next().is_some();
    let any_role = root.descendants().into_iter().any(|e| e.attr("role").is_some());

    let mut access_modes = vec!["textual".to_owned()];
    if any_image {
        access_modes.push("visual".to_owned());
    }
    if any_audio_or_video {
        access_modes.push("auditory".to_owned());
    }

    let mut features = Vec::new();
    if has_headings {
        features.push("structuralNavigation".to_owned());
    }
    if alt_complete {
        features.push("alternativeText".to_owned());
    }
    if any_role {
        features.push("ARIA".to_owned());
    }
    if nav_has_toc {
        features.push("tableOfContents".to_owned());
    }

    let mut conformance = vec!["EPUB-Accessibility-1.1".to_owned()];
    if total >= 80.0 {
        conformance.push("WCAG-2.1-A".to_owned());
    }
    if total >= 90.0 {
        conformance.push("WCAG-2.1-AA".to_owned());
    }

    let summary = format!("{tier} accessibility ({:.0}/100)", total);

    AccessibilityScore {
        language,
        semantic,
        aria,
        alt_text,
        headings,
        reading_order,
        total,
        tier,
        access_modes,
        features,
        conformance,
        summary,
    }
}

fn score_language(root: &Element, path: &str, sink: &mut FindingSink) -> f64 {
    let lang = root.attr("lang").or_else(|| root.attr("xml:lang"));
    let Some(lang) = lang.filter(|l| !l.is_empty()) else {
        sink.emit_at("EPUB-A11Y-001", "html element has no lang or xml:lang attribute", Location::in_file(path));
        return 0.0;
    };

    let primary = lang.split('-').next().unwrap_or(lang).to_ascii_lowercase();
    if ISO_639_CODES.contains(&primary.as_str()) {
        5.0
    } else {
        sink.emit_at(
            "EPUB-A11Y-002",
            format!("lang value '{lang}' is not a recognized ISO 639 code"),
            Location::in_file(path),
        );
        2.5
    }
}

fn semantic_elements(root: &Element) -> impl Iterator<Item = &Element> {
    const TAGS: [&str; 7] = ["article", "section", "nav", "header", "footer", "aside", "main"];
    root.descendants().into_iter().filter(move |e| TAGS.contains(&e.local_name()))
}

fn score_semantic(root: &Element, path: &str, sink: &mut FindingSink) -> f64 {
    let count = semantic_elements(root).count();
    if count == 0 {
        sink.emit_at("EPUB-A11Y-003", "no semantic structuring elements found", Location::in_file(path));
        return 0.0;
    }
    (count as f64 * 5.0).min(25.0)
}

fn score_aria(root: &Element, path: &str, sink: &mut FindingSink) -> f64 {
    let mut score = 20.0;
    for element in root.descendants() {
        if let Some(role) = element.attr("role") {
            let all_known = role.split_whitespace().all(|token| KNOWN_ARIA_ROLES.contains(&token));
            if !all_known {
                sink.emit_at(
                    "EPUB-A11Y-007",
                    format!("role attribute value '{role}' is not a recognized ARIA role"),
                    Location::at_selector(path, format!("//*[@role='{role}']")),
                );
                score -= ARIA_ROLE_PENALTY;
            }

            if ROLES_REQUIRING_LABEL.contains(&role)
                && element.attr("aria-label").is_none()
                && element.attr("aria-labelledby").is_none()
                && element.attr("title").is_none()
            {
                sink.emit_at(
                    "EPUB-A11Y-009",
                    format!("role='{role}' requires an accessible label that is missing"),
                    Location::at_selector(path, format!("//*[@role='{role}']")),
                );
                score -= ARIA_LABEL_PENALTY;
            }
        }

        for key in element.attributes.keys().filter(|k| k.starts_with("aria-")) {
            if !KNOWN_ARIA_ATTRIBUTES.contains(&key.as_str()) {
                sink.emit_at(
                    "EPUB-A11Y-008",
                    format!("attribute '{key}' is not in the WAI-ARIA registry"),
                    Location::at_selector(path, format!("//*[@{key}]")),
                );
                score -= ARIA_ATTRIBUTE_PENALTY;
            }
        }
    }
    score.max(0.0)
}

fn score_alt_text(root: &Element, path: &str, sink: &mut FindingSink) -> (f64, bool, bool) {
    let images = root.find_all("img");
    let total = images.len();
    if total == 0 {
        return (25.0, false, false);
    }

    let mut missing = 0usize;
    for image in &images {
        match image.attr("alt") {
            None => {
                missing += 1;
                sink.emit_at("EPUB-A11Y-005", "img element has no alt attribute", Location::in_file(path));
            }
            Some("") => {
                let asserts_decorative =
                    image.attr("role") == Some("presentation") || image.attr("aria-hidden") == Some("true");
                if !asserts_decorative {
                    sink.emit_at(
                        "EPUB-A11Y-006",
                        "alt is empty but context does not assert the image is decorative",
                        Location::in_file(path),
                    );
                }
            }
            Some(_) => {}
        }
    }

    let score = 25.0 * (total - missing) as f64 / total as f64;
    (score, true, missing == 0)
}

fn heading_elements(root: &Element) -> impl Iterator<Item = &Element> {
    root.descendants().into_iter().filter(|e| HEADING_TAGS.contains(&e.local_name()))
}

fn heading_level(element: &Element) -> u32 {
    element.local_name().trim_start_matches('h').parse().unwrap_or(1)
}

fn score_headings(root: &Element, path: &str, sink: &mut FindingSink) -> f64 {
    let headings: Vec<&Element> = heading_elements(root).collect();
    if headings.is_empty() {
        return 15.0;
    }

    let mut score = 15.0;

    if heading_level(headings[0]) != 1 {
        sink.emit_at(
            "EPUB-A11Y-004",
            "first heading in the document is not an h1",
            Location::in_file(path),
        );
        score -= HEADING_PENALTY;
    }

    for heading in &headings {
        if heading.text_content().is_empty() {
            sink.emit_at(
                "EPUB-A11Y-019",
                "heading element has empty text content",
                Location::at_selector(path, format!("//{}", heading.local_name())),
            );
            score -= HEADING_PENALTY;
        }
    }

    for window in headings.windows(2) {
        let (previous, next) = (heading_level(window[0]), heading_level(window[1]));
        if next > previous + 1 {
            sink.emit_at(
                "EPUB-A11Y-020",
                format!("heading level jumps from h{previous} to h{next}, skipping a level"),
                Location::at_selector(path, format!("//{}", window[1].local_name())),
            );
            score -= HEADING_PENALTY;
        }
    }

    score.max(0.0)
}

fn score_reading_order(root: &Element, path: &str, sink: &mut FindingSink) -> f64 {
    let violations = root
        .descendants()
        .into_iter()
        .filter(|e| e.attr("tabindex").and_then(|v| v.parse::<i64>().ok()).is_some_and(|v| v > 0))
        .count();

    if violations > 0 {
        sink.emit_at(
            "EPUB-A11Y-010",
            format!("{violations} element(s) use a positive tabindex, overriding natural reading order"),
            Location::in_file(path),
        );
    }

    (10.0 - READING_ORDER_PENALTY * violations as f64).max(0.0)
}

fn validate_table_headers(root: &Element, path: &str, sink: &mut FindingSink) {
    for table in root.find_all("table") {
        let headers = table.descendants();
        let headers: Vec<&Element> = headers.into_iter().filter(|e| e.local_name() == "th").collect();
        if headers.is_empty() {
            sink.emit_at("EPUB-A11Y-011", "data table has no th header cells", Location::in_file(path));
            continue;
        }
        for th in headers {
            if th.attr("scope").is_none() && th.attr("id").is_none() {
                sink.emit_at(
                    "EPUB-A11Y-012",
                    "th header cell has no scope or id association",
                    Location::in_file(path),
                );
            }
        }
    }
}

fn validate_form_labels(root: &Element, path: &str, sink: &mut FindingSink) {
    let ids: HashSet<&str> = root.descendants().into_iter().filter_map(|e| e.attr("id")).collect();
    let labelled_for: HashSet<&str> =
        root.find_all("label").into_iter().filter_map(|l| l.attr("for")).collect();

    for control in ["input", "select", "textarea"].iter().flat_map(|tag| root.find_all(tag)) {
        if control.attr("type") == Some("hidden") {
            continue;
        }
        let has_label = control
            .attr("id")
            .is_some_and(|id| labelled_for.contains(id) && ids.contains(id))
            || control.attr("aria-label").is_some()
            || control.attr("aria-labelledby").is_some();
        if !has_label {
            sink.emit_at("EPUB-A11Y-013", "form control has no associated label", Location::in_file(path));
        }
    }
}

fn validate_media_captions(root: &Element, path: &str, sink: &mut FindingSink) {
    for media in ["audio", "video"].iter().flat_map(|tag| root.find_all(tag)) {
        let has_track = media.child_elements().any(|e| e.local_name() == "track");
        let has_description = media.attr("aria-describedby").is_some();
        if !has_track && !has_description {
            sink.emit_at(
                "EPUB-A11Y-015",
                "media element has no captions or audio description",
                Location::in_file(path),
            );
        }
    }
}

fn validate_main_landmark(root: &Element, path: &str, sink: &mut FindingSink) {
    let count = root
        .descendants()
        .into_iter()
        .filter(|e| e.local_name() == "main" || e.attr("role") == Some("main"))
        .count();
    if count != 1 {
        sink.emit_at(
            "EPUB-A11Y-018",
            format!("document has {count} main landmarks, expected exactly one"),
            Location::in_file(path),
        );
    }
}

fn validate_duplicate_ids(root: &Element, path: &str, sink: &mut FindingSink) {
    let mut seen = HashSet::new();
    for element in root.descendants() {
        if let Some(id) = element.attr("id").filter(|id| !id.is_empty()) {
            if !seen.insert(id) {
                sink.emit_at(
                    "EPUB-A11Y-014",
                    format!("duplicate id '{id}' in the content document"),
                    Location::at_selector(path, format!("//*[@id='{id}']")),
                );
            }
        }
    }
}

fn validate_link_text(root: &Element, path: &str, sink: &mut FindingSink) {
    for anchor in root.find_all("a") {
        let text = anchor.text_content().to_ascii_lowercase();
        if NON_DESCRIPTIVE_LINK_TEXT.contains(&text.as_str()) {
            sink.emit_with_details(
                "EPUB-A11Y-017",
                format!("link text '{text}' is not descriptive out of context"),
                Location::in_file(path),
                BTreeMap::from([("text".to_owned(), DetailValue::from(text))]),
            );
        }
    }

    for embed in ["iframe", "object"].iter().flat_map(|tag| root.find_all(tag)) {
        let labelled = embed.attr("title").is_some() || embed.attr("aria-label").is_some();
        if !labelled {
            sink.emit_at(
                "EPUB-A11Y-016",
                format!("embedded <{}> has no title or accessible name", embed.local_name()),
                Location::in_file(path),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::xml;

    const ACCESSIBLE_DOC: &str = r#"<html lang="en"><body>
<header>Site</header>
<nav><a href="#main">Skip</a></nav>
<main id="main">
  <article>
    <h1>Title</h1>
    <h2>Section A</h2>
    <figure><img src="a.png" alt="a description"/><figcaption>Caption</figcaption></figure>
    <h2>Section B</h2>
    <table><thead><tr><th scope="col">Name</th></tr></thead><tbody><tr><td>X</td></tr></tbody></table>
    <form><label for="f1">Name</label><input id="f1" type="text"/></form>
  </article>
</main>
</body></html>"#;

    const INACCESSIBLE_DOC: &str = r#"<html><body>
<h3>Sub-heading</h3>
<h5>Too deep</h5>
<img src="a.png"/>
<div role="invalid-role">x</div>
<table><tr><td>No headers</td></tr></table>
<input type="text"/>
</body></html>"#;

    #[test]
    fn scores_accessible_document_highly() {
        let root = xml::parse(ACCESSIBLE_DOC.as_bytes()).unwrap();
        let mut sink = FindingSink::new();
        let score = validate(&root, "OEBPS/c1.xhtml", true, &mut sink);
        assert!(score.total >= 90.0, "total was {}", score.total);
        assert_eq!(score.tier, ComplianceTier::WcagAa);
        assert!(!sink.has_errors());
    }

    #[test]
    fn scores_inaccessible_document_poorly() {
        let root = xml::parse(INACCESSIBLE_DOC.as_bytes()).unwrap();
        let mut sink = FindingSink::new();
        let score = validate(&root, "OEBPS/c1.xhtml", false, &mut sink);
        assert!(score.total < 60.0, "total was {}", score.total);
        assert_eq!(score.tier, ComplianceTier::NonCompliant);

        let codes: HashSet<&str> = sink.errors().iter().map(|f| f.code.as_str()).collect();
        for expected in ["EPUB-A11Y-001", "EPUB-A11Y-005", "EPUB-A11Y-007", "EPUB-A11Y-011", "EPUB-A11Y-013", "EPUB-A11Y-020"]
        {
            assert!(codes.contains(expected), "missing {expected} in {codes:?}");
        }
    }
}
