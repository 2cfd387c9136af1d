//! EPUB validation pipeline: container (C3) → package (C4) → nav/content (C5) → accessibility (C6).

pub mod accessibility;
pub mod consts;
pub mod container;
pub mod content;
pub mod nav;
pub mod package;
pub mod xml;

use std::collections::BTreeMap;
use std::io::{Read, Seek};

use crate::container::ZipContainer;
use crate::diagnostics::{DetailValue, FindingSink, Location};
use crate::util::{resolve_href, strip_leading_slash};

const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// Run the whole EPUB pipeline against an opened ZIP container, returning report metadata.
///
/// Every step continues past non-fatal findings: a missing rootfile doesn't stop navigation or
/// content validation for rootfiles that do resolve, and a broken content document doesn't stop
/// its siblings in the spine from being validated and scored.
///
/// `skip_accessibility` drops the C6 scoring pass only; container/package/nav/content structural
/// checks always run regardless, since those are what make a document valid in the first place.
pub fn validate<R: Read + Seek>(
    zip: &mut ZipContainer<R>,
    skip_accessibility: bool,
    sink: &mut FindingSink,
) -> BTreeMap<String, DetailValue> {
    let mut metadata = BTreeMap::new();

    let Some(rootfiles) = container::validate(zip, sink) else {
        return metadata;
    };

    for rootfile in &rootfiles {
        let opf_absolute = format!("/{}", rootfile.full_path);
        let opf_entry = strip_leading_slash(&opf_absolute).to_owned();

        if !zip.contains(&opf_entry) {
            sink.emit_at(
                "EPUB-OPF-015",
                format!("referenced package file '{}' is missing from the container", rootfile.full_path),
                Location::in_file(&rootfile.full_path),
            );
            continue;
        }

        let Ok(opf_bytes) = zip.read_entry(&opf_entry) else {
            continue;
        };

        let Some(package) = package::validate(&opf_bytes, &rootfile.full_path, sink) else {
            continue;
        };

        metadata.insert("manifest_item_count".to_owned(), DetailValue::from(package.manifest.len()));
        metadata.insert("spine_length".to_owned(), DetailValue::from(package.spine_idrefs.len()));

        let nav_has_toc = validate_nav(zip, &opf_absolute, &package, sink);
        validate_content_documents(zip, &opf_absolute, &package, nav_has_toc, skip_accessibility, sink, &mut metadata);
    }

    metadata
}

fn validate_nav<R: Read + Seek>(
    zip: &mut ZipContainer<R>,
    opf_absolute: &str,
    package: &package::PackageInfo,
    sink: &mut FindingSink,
) -> bool {
    let Some(nav_item) = &package.nav_item else {
        return false;
    };

    let nav_absolute = resolve_href(opf_absolute, &nav_item.href);
    let nav_entry = strip_leading_slash(&nav_absolute);
    let nav_display_path = strip_leading_slash(&nav_absolute);

    let Ok(nav_bytes) = zip.read_entry(nav_entry) else {
        return false;
    };

    match nav::validate(&nav_bytes, nav_display_path, sink) {
        Some(root) => nav::document_has_toc(&root),
        None => false,
    }
}

fn validate_content_documents<R: Read + Seek>(
    zip: &mut ZipContainer<R>,
    opf_absolute: &str,
    package: &package::PackageInfo,
    nav_has_toc: bool,
    skip_accessibility: bool,
    sink: &mut FindingSink,
    metadata: &mut BTreeMap<String, DetailValue>,
) {
    for idref in &package.spine_idrefs {
        let Some(item) = package.manifest_item(idref) else {
            continue;
        };
        if item.media_type != XHTML_MEDIA_TYPE {
            continue;
        }

        let content_absolute = resolve_href(opf_absolute, &item.href);
        let content_entry = strip_leading_slash(&content_absolute);
        let content_display_path = strip_leading_slash(&content_absolute).to_owned();

        let Ok(content_bytes) = zip.read_entry(content_entry) else {
            continue;
        };

        let has_scripted = item.has_property("scripted");
        let Some(root) = content::validate(&content_bytes, &content_display_path, has_scripted, sink) else {
            continue;
        };

        if skip_accessibility {
            continue;
        }

        let score = accessibility::validate(&root, &content_display_path, nav_has_toc, sink);
        metadata.insert(format!("accessibility_score:{content_display_path}"), DetailValue::from(&score));
    }
}
