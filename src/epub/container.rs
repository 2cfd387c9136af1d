//! EPUB container validator (C3): `mimetype` and `META-INF/container.xml` rules.
//!
//! `EPUB-CONTAINER-001` (source is not a ZIP at all) is handled one layer up, by the façade:
//! by the time a [`ZipContainer`] reaches this module the archive is known to exist and to have
//! a readable central directory.

use std::io::{Read, Seek};

use crate::container::ZipContainer;
use crate::diagnostics::{FindingSink, Location};
use crate::epub::consts::{CONTAINER_PATH, MIMETYPE_CONTENTS, MIMETYPE_PATH};
use crate::epub::xml;

/// One `<rootfile>` reference resolved from `META-INF/container.xml`.
#[derive(Clone, Debug)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// Run the container rules, returning the declared rootfiles if `container.xml` is usable.
///
/// Continues past every non-fatal rule violation, per the "maximally diagnostic" contract: a
/// broken `mimetype` entry does not prevent `container.xml` from also being checked.
pub fn validate<R: Read + Seek>(
    container: &mut ZipContainer<R>,
    sink: &mut FindingSink,
) -> Option<Vec<RootFile>> {
    validate_mimetype(container, sink);
    validate_container_xml(container, sink)
}

fn validate_mimetype<R: Read + Seek>(container: &mut ZipContainer<R>, sink: &mut FindingSink) {
    if container.mimetype_entry_out_of_place() {
        sink.emit_at(
            "EPUB-CONTAINER-003",
            "the 'mimetype' entry must be the first entry in the archive",
            Location::in_file(MIMETYPE_PATH),
        );
    }

    if !container.contains(MIMETYPE_PATH) {
        sink.emit_at(
            "EPUB-CONTAINER-002",
            "the container has no 'mimetype' entry",
            Location::in_file(MIMETYPE_PATH),
        );
        return;
    }

    match container.read_entry(MIMETYPE_PATH) {
        Ok(bytes) if bytes == MIMETYPE_CONTENTS.as_bytes() => {}
        _ => {
            sink.emit_at(
                "EPUB-CONTAINER-002",
                format!("'mimetype' must contain exactly '{MIMETYPE_CONTENTS}'"),
                Location::in_file(MIMETYPE_PATH),
            );
        }
    }

    let stored = container
        .entries()
        .iter()
        .find(|entry| entry.name == MIMETYPE_PATH)
        .is_some_and(|entry| entry.method == crate::container::StorageMethod::Stored);
    if !stored {
        sink.emit_at(
            "EPUB-CONTAINER-002",
            "'mimetype' must be stored without compression",
            Location::in_file(MIMETYPE_PATH),
        );
    }
}

fn validate_container_xml<R: Read + Seek>(
    container: &mut ZipContainer<R>,
    sink: &mut FindingSink,
) -> Option<Vec<RootFile>> {
    if !container.contains(CONTAINER_PATH) {
        sink.emit_at(
            "EPUB-CONTAINER-004",
            "META-INF/container.xml is missing",
            Location::in_file(CONTAINER_PATH),
        );
        return None;
    }

    let bytes = match container.read_entry(CONTAINER_PATH) {
        Ok(bytes) => bytes,
        Err(_) => {
            sink.emit_at(
                "EPUB-CONTAINER-005",
                "META-INF/container.xml could not be read",
                Location::in_file(CONTAINER_PATH),
            );
            return None;
        }
    };

    let root = match xml::parse(&bytes) {
        Ok(root) => root,
        Err(error) => {
            sink.emit_at(
                "EPUB-CONTAINER-005",
                format!("META-INF/container.xml is not well-formed: {error}"),
                Location::in_file(CONTAINER_PATH),
            );
            return None;
        }
    };

    let rootfiles: Vec<RootFile> = root
        .find_all("rootfile")
        .into_iter()
        .filter_map(|element| {
            let full_path = element.attr("full-path")?.trim();
            if full_path.is_empty() {
                return None;
            }
            Some(RootFile {
                full_path: full_path.to_owned(),
                media_type: element.attr("media-type").unwrap_or_default().to_owned(),
            })
        })
        .collect();

    if rootfiles.is_empty() {
        sink.emit_at(
            "EPUB-CONTAINER-005",
            "META-INF/container.xml declares no usable rootfile",
            Location::in_file(CONTAINER_PATH),
        );
        return None;
    }

    Some(rootfiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use std::io::Write;

    fn zip_with(entries: &[(&str, &[u8], zip::CompressionMethod)]) -> ZipContainer<std::io::Cursor<Vec<u8>>> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, data, method) in entries {
                let options = zip::write::SimpleFileOptions::default().compression_method(*method);
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        ZipContainer::open_bytes(buf.into_inner()).unwrap()
    }

    #[test]
    fn accepts_well_formed_container() {
        let mut container = zip_with(&[
            ("mimetype", MIMETYPE_CONTENTS.as_bytes(), zip::CompressionMethod::Stored),
            (
                CONTAINER_PATH,
                br#"<?xml version="1.0"?><container><rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles></container>"#,
                zip::CompressionMethod::Deflated,
            ),
        ]);
        let mut sink = FindingSink::new();
        let rootfiles = validate(&mut container, &mut sink).unwrap();
        assert_eq!(rootfiles.len(), 1);
        assert_eq!(rootfiles[0].full_path, "OEBPS/content.opf");
        assert!(!sink.has_errors());
    }

    #[test]
    fn flags_wrong_mimetype_contents() {
        let mut container = zip_with(&[
            ("mimetype", b"application/zip", zip::CompressionMethod::Stored),
            (CONTAINER_PATH, b"<container><rootfiles/></container>", zip::CompressionMethod::Deflated),
        ]);
        let mut sink = FindingSink::new();
        validate_mimetype(&mut container, &mut sink);
        assert!(sink.errors().iter().any(|f| f.code == "EPUB-CONTAINER-002"));
    }

    #[test]
    fn flags_missing_container_xml() {
        let mut container =
            zip_with(&[("mimetype", MIMETYPE_CONTENTS.as_bytes(), zip::CompressionMethod::Stored)]);
        let mut sink = FindingSink::new();
        assert!(validate(&mut container, &mut sink).is_none());
        assert!(
            sink.errors()
                .iter()
                .any(|f| f.code == "EPUB-CONTAINER-004" && f.severity == Severity::Error)
        );
    }
}
