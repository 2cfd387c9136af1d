//! Small path/URI helpers shared by the EPUB validators.
//!
//! EPUB hrefs are always resolved relative to the referencing document before being looked up in
//! the manifest; this module only needs a narrow slice of that behavior (absolute-from-root
//! resolution, no relativizing for writing).

use std::fs::File;
use std::path::Path;

use crate::error::OperationalError;

const SEPARATOR: char = '/';

/// Open `path` for reading, mapping I/O failure into an [`OperationalError`].
pub(crate) fn open_file(path: &Path) -> Result<File, OperationalError> {
    File::open(path).map_err(|source| OperationalError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Read `path` fully into memory, mapping I/O failure into an [`OperationalError`].
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, OperationalError> {
    std::fs::read(path).map_err(|source| OperationalError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// The directory component of an absolute, `/`-separated container path.
fn parent(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(0) => "/",
        Some(index) => &path[..index],
        None => "",
    }
}

/// Join a relative href onto the directory of `referencing_path`, collapsing `.`/`..` segments.
///
/// Both inputs are container-internal, `/`-separated paths (never OS paths). The result always
/// starts with `/`.
pub(crate) fn resolve_href(referencing_path: &str, href: &str) -> String {
    // Strip any fragment/query before resolving.
    let href = href.split(['#', '?']).next().unwrap_or(href);

    let mut segments: Vec<&str> = if href.starts_with(SEPARATOR) {
        Vec::new()
    } else {
        parent(referencing_path)
            .split(SEPARATOR)
            .filter(|s| !s.is_empty())
            .collect()
    };

    for segment in href.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut resolved = String::with_capacity(href.len() + 1);
    resolved.push(SEPARATOR);
    resolved.push_str(&segments.join("/"));
    resolved
}

/// Strip a leading `/` from a container-internal path, for ZIP entry lookups.
pub(crate) fn strip_leading_slash(path: &str) -> &str {
    path.strip_prefix(SEPARATOR).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_sibling_href() {
        assert_eq!(resolve_href("/OEBPS/content.opf", "nav.xhtml"), "/OEBPS/nav.xhtml");
    }

    #[test]
    fn resolves_parent_traversal() {
        assert_eq!(
            resolve_href("/OEBPS/text/chapter1.xhtml", "../images/cover.png"),
            "/OEBPS/images/cover.png"
        );
    }

    #[test]
    fn absolute_href_is_unaffected_by_referencing_path() {
        assert_eq!(resolve_href("/OEBPS/content.opf", "/META-INF/foo.xml"), "/META-INF/foo.xml");
    }

    #[test]
    fn drops_fragment_and_query() {
        assert_eq!(resolve_href("/OEBPS/content.opf", "nav.xhtml#toc"), "/OEBPS/nav.xhtml");
    }
}
