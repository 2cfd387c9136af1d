//! EPUB package (OPF) validator (C4): metadata, manifest, and spine rules.

use std::collections::{BTreeMap, HashSet};

use crate::diagnostics::{DetailValue, FindingSink, Location};
use crate::epub::xml::{self, Element};

/// One `<manifest><item>` entry.
#[derive(Clone, Debug)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
}

impl ManifestItem {
    pub fn has_property(&self, token: &str) -> bool {
        self.properties.iter().any(|p| p == token)
    }
}

/// Everything downstream validators (nav, content, repair) need from a parsed package document.
#[derive(Clone, Debug)]
pub struct PackageInfo {
    pub version: String,
    pub manifest: Vec<ManifestItem>,
    pub spine_idrefs: Vec<String>,
    pub nav_item: Option<ManifestItem>,
}

impl PackageInfo {
    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }
}

/// Parse and validate `content.opf`-shaped bytes, returning manifest/spine data for downstream use.
pub fn validate(bytes: &[u8], path: &str, sink: &mut FindingSink) -> Option<PackageInfo> {
    let root = match xml::parse(bytes) {
        Ok(root) => root,
        Err(error) => {
            sink.emit_at(
                "EPUB-OPF-001",
                format!("package document is not well-formed XML: {error}"),
                Location::in_file(path),
            );
            return None;
        }
    };

    let metadata = root.find("metadata");
    validate_dc_field(metadata, "title", "EPUB-OPF-002", path, sink);
    let identifier_ids = validate_identifiers(metadata, path, sink);
    validate_dc_field(metadata, "language", "EPUB-OPF-004", path, sink);
    validate_modified(metadata, path, sink);
    validate_unique_identifier(&root, &identifier_ids, path, sink);

    let manifest = validate_manifest(&root, path, sink);
    let nav_item = find_nav_item(&manifest, path, sink);
    let spine_idrefs = validate_spine(&root, &manifest, path, sink);

    let version = root.attr("version").unwrap_or("3.0").to_owned();
    if version.starts_with("2.") {
        validate_epub2_toc(&root, &manifest, path, sink);
    }

    Some(PackageInfo { version, manifest, spine_idrefs, nav_item })
}

fn validate_dc_field(
    metadata: Option<&Element>,
    local_name: &str,
    code: &'static str,
    path: &str,
    sink: &mut FindingSink,
) {
    let present = metadata
        .map(|metadata| metadata.find_all(local_name))
        .unwrap_or_default()
        .into_iter()
        .any(|element| !element.text_content().is_empty());

    if !present {
        sink.emit_at(
            code,
            format!("dc:{local_name} is missing or empty"),
            Location::at_selector(path, format!("/package/metadata/dc:{local_name}")),
        );
    }
}

fn validate_identifiers(metadata: Option<&Element>, path: &str, sink: &mut FindingSink) -> HashSet<String> {
    let identifiers = metadata.map(|metadata| metadata.find_all("identifier")).unwrap_or_default();
    let non_empty: Vec<&Element> = identifiers
        .iter()
        .copied()
        .filter(|element| !element.text_content().is_empty())
        .collect();

    if non_empty.is_empty() {
        sink.emit_at(
            "EPUB-OPF-003",
            "dc:identifier is missing or empty",
            Location::at_selector(path, "/package/metadata/dc:identifier"),
        );
    }

    non_empty.iter().filter_map(|element| element.attr("id")).map(str::to_owned).collect()
}

fn validate_modified(metadata: Option<&Element>, path: &str, sink: &mut FindingSink) {
    let present = metadata
        .map(|metadata| metadata.find_all("meta"))
        .unwrap_or_default()
        .into_iter()
        .any(|element| {
            element.attr("property") == Some("dcterms:modified") && !element.text_content().is_empty()
        });

    if !present {
        sink.emit_at(
            "EPUB-OPF-005",
            "meta[property=dcterms:modified] is missing or empty",
            Location::at_selector(path, "/package/metadata/meta[@property='dcterms:modified']"),
        );
    }
}

fn validate_unique_identifier(
    root: &Element,
    identifier_ids: &HashSet<String>,
    path: &str,
    sink: &mut FindingSink,
) {
    match root.attr("unique-identifier") {
        Some(id) if identifier_ids.contains(id) => {}
        _ => {
            sink.emit_at(
                "EPUB-OPF-006",
                "package unique-identifier does not reference a dc:identifier id",
                Location::at_selector(path, "/package/@unique-identifier"),
            );
        }
    }
}

fn validate_manifest(root: &Element, path: &str, sink: &mut FindingSink) -> Vec<ManifestItem> {
    let Some(manifest) = root.find("manifest") else {
        sink.emit_at("EPUB-OPF-007", "manifest element is missing", Location::in_file(path));
        return Vec::new();
    };

    let raw_items: Vec<&Element> = manifest.child_elements().filter(|e| e.local_name() == "item").collect();
    if raw_items.is_empty() {
        sink.emit_at("EPUB-OPF-007", "manifest element is empty", Location::in_file(path));
        return Vec::new();
    }

    let mut seen_ids = HashSet::new();
    let mut items = Vec::with_capacity(raw_items.len());
    for element in raw_items {
        let id = element.attr("id").unwrap_or_default().to_owned();
        let href = element.attr("href").unwrap_or_default().to_owned();
        let media_type = element.attr("media-type").unwrap_or_default().to_owned();

        if id.is_empty() || href.is_empty() || media_type.is_empty() {
            sink.emit_at(
                "EPUB-OPF-010",
                "manifest item is missing id, href, or media-type",
                Location::at_selector(path, format!("/package/manifest/item[@id='{id}']")),
            );
        }

        if !media_type.is_empty() && !is_well_formed_mime_type(&media_type) {
            sink.emit_at(
                "EPUB-OPF-012",
                format!("manifest item media-type '{media_type}' is not a well-formed MIME type"),
                Location::at_selector(path, format!("/package/manifest/item[@id='{id}']")),
            );
        }

        if !id.is_empty() && !seen_ids.insert(id.clone()) {
            sink.emit_at(
                "EPUB-OPF-014",
                format!("duplicate manifest item id '{id}'"),
                Location::at_selector(path, format!("/package/manifest/item[@id='{id}']")),
            );
        }

        let properties = element
            .attr("properties")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_owned)
            .collect();

        items.push(ManifestItem { id, href, media_type, properties });
    }
    items
}

fn is_well_formed_mime_type(value: &str) -> bool {
    let Some((kind, subtype)) = value.split_once('/') else {
        return false;
    };
    let is_token = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_graphic() && b != b'/');
    is_token(kind) && is_token(subtype)
}

fn find_nav_item(manifest: &[ManifestItem], path: &str, sink: &mut FindingSink) -> Option<ManifestItem> {
    let nav_items: Vec<&ManifestItem> = manifest.iter().filter(|item| item.has_property("nav")).collect();
    match nav_items.as_slice() {
        [single] => Some((*single).clone()),
        _ => {
            sink.emit_at(
                "EPUB-OPF-009",
                format!(
                    "manifest must include exactly one item with the 'nav' property, found {}",
                    nav_items.len()
                ),
                Location::in_file(path),
            );
            None
        }
    }
}

fn validate_spine(
    root: &Element,
    manifest: &[ManifestItem],
    path: &str,
    sink: &mut FindingSink,
) -> Vec<String> {
    let Some(spine) = root.find("spine") else {
        sink.emit_at("EPUB-OPF-008", "spine element is missing", Location::in_file(path));
        return Vec::new();
    };

    let itemrefs: Vec<&Element> = spine.child_elements().filter(|e| e.local_name() == "itemref").collect();
    if itemrefs.is_empty() {
        sink.emit_at("EPUB-OPF-008", "spine element is empty", Location::in_file(path));
        return Vec::new();
    }

    let mut idrefs = Vec::with_capacity(itemrefs.len());
    for itemref in itemrefs {
        let idref = itemref.attr("idref").unwrap_or_default().to_owned();
        if idref.is_empty() || manifest.iter().all(|item| item.id != idref) {
            sink.emit_at(
                "EPUB-OPF-011",
                format!("spine itemref '{idref}' does not resolve to a manifest item id"),
                Location::at_selector(path, "/package/spine/itemref"),
            );
        }
        idrefs.push(idref);
    }
    idrefs
}

fn validate_epub2_toc(root: &Element, manifest: &[ManifestItem], path: &str, sink: &mut FindingSink) {
    let Some(spine) = root.find("spine") else { return };
    let ncx_ok = spine
        .attr("toc")
        .and_then(|toc_id| manifest.iter().find(|item| item.id == toc_id))
        .is_some_and(|item| item.media_type == "application/x-dtbncx+xml");

    if !ncx_ok {
        sink.emit_with_details(
            "EPUB-OPF-013",
            "EPUB 2 spine has no toc attribute referencing an NCX manifest item",
            Location::at_selector(path, "/package/spine/@toc"),
            BTreeMap::from([("version".to_owned(), DetailValue::from(root.attr("version").unwrap_or_default()))]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_OPF: &str = r#"<?xml version="1.0"?>
<package version="3.0" unique-identifier="bookid">
  <metadata>
    <dc:title>A Title</dc:title>
    <dc:identifier id="bookid">urn:uuid:1</dc:identifier>
    <dc:language>en</dc:language>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
  </spine>
</package>"#;

    #[test]
    fn accepts_well_formed_package() {
        let mut sink = FindingSink::new();
        let info = validate(VALID_OPF.as_bytes(), "OEBPS/content.opf", &mut sink).unwrap();
        assert!(!sink.has_errors());
        assert_eq!(info.manifest.len(), 2);
        assert_eq!(info.spine_idrefs, vec!["c1".to_owned()]);
        assert!(info.nav_item.is_some());
    }

    #[test]
    fn flags_missing_modified_meta() {
        let opf = VALID_OPF.replace(
            r#"<meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>"#,
            "",
        );
        let mut sink = FindingSink::new();
        validate(opf.as_bytes(), "OEBPS/content.opf", &mut sink);
        assert_eq!(sink.errors().len(), 1);
        assert_eq!(sink.errors()[0].code, "EPUB-OPF-005");
    }

    #[test]
    fn flags_spine_itemref_not_in_manifest() {
        let opf = VALID_OPF.replace(r#"idref="c1""#, r#"idref="missing""#);
        let mut sink = FindingSink::new();
        validate(opf.as_bytes(), "OEBPS/content.opf", &mut sink);
        assert!(sink.errors().iter().any(|f| f.code == "EPUB-OPF-011"));
    }

    #[test]
    fn malformed_media_type_is_a_warning_not_an_error() {
        let opf = VALID_OPF.replace(
            r#"href="chapter1.xhtml" media-type="application/xhtml+xml""#,
            r#"href="chapter1.xhtml" media-type="not-a-mime""#,
        );
        let mut sink = FindingSink::new();
        validate(opf.as_bytes(), "OEBPS/content.opf", &mut sink);
        assert!(!sink.has_errors());
        assert!(sink.warnings().iter().any(|f| f.code == "EPUB-OPF-012"));
    }
}
