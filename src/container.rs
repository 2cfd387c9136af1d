//! The ZIP container reader (C2).
//!
//! A thin wrapper over the `zip` crate, exposing exactly what the EPUB container and package
//! validators need: central-directory order, storage method, and byte-wise lookup.

use std::io::{Cursor, Read, Seek};

use crate::error::OperationalError;

/// How a ZIP entry is stored.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StorageMethod {
    /// Stored without compression.
    Stored,
    /// Deflate-compressed.
    Deflated,
    /// Any other compression method the `zip` crate recognizes.
    Other,
}

/// One entry in a ZIP central directory.
#[derive(Clone, Debug)]
pub struct ZipEntry {
    /// The entry's name, exactly as recorded (container-internal path, `/`-separated).
    pub name: String,
    /// How the entry is stored.
    pub method: StorageMethod,
    /// Uncompressed size in bytes.
    pub uncompressed_size: u64,
    /// Position of this entry within the central directory (0-based).
    pub index: usize,
}

/// A ZIP archive opened for random access.
pub struct ZipContainer<R> {
    archive: zip::ZipArchive<R>,
    entries: Vec<ZipEntry>,
}

impl<R: Read + Seek> ZipContainer<R> {
    /// Open `reader` as a ZIP archive, reading its central directory.
    ///
    /// Fails with [`OperationalError::NotAZip`] when the central directory cannot be located:
    /// this is the one case EPUB-CONTAINER-001 treats as fatal for the whole document.
    pub fn open(reader: R) -> Result<Self, OperationalError> {
        let mut archive = zip::ZipArchive::new(reader).map_err(|source| OperationalError::NotAZip {
            path: std::path::PathBuf::new(),
            source,
        })?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index(index)
                .map_err(|source| OperationalError::NotAZip {
                    path: std::path::PathBuf::new(),
                    source,
                })?;
            entries.push(ZipEntry {
                name: file.name().to_owned(),
                method: match file.compression() {
                    zip::CompressionMethod::Stored => StorageMethod::Stored,
                    zip::CompressionMethod::Deflated => StorageMethod::Deflated,
                    _ => StorageMethod::Other,
                },
                uncompressed_size: file.size(),
                index,
            });
        }

        Ok(Self { archive, entries })
    }

    /// Entries in central-directory order.
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Whether the first central-directory entry is `mimetype`, stored uncompressed.
    pub fn first_entry_is_stored_mimetype(&self) -> bool {
        matches!(
            self.entries.first(),
            Some(entry) if entry.name == "mimetype" && entry.method == StorageMethod::Stored
        )
    }

    /// Whether an entry named `mimetype` exists anywhere but at index 0.
    pub fn mimetype_entry_out_of_place(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.name == "mimetype" && entry.index != 0)
    }

    /// Whether an entry with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Read the full bytes of a named entry.
    pub fn read_entry(&mut self, name: &str) -> std::io::Result<Vec<u8>> {
        let mut file = self.archive.by_name(name)?;
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl ZipContainer<Cursor<Vec<u8>>> {
    /// Open a ZIP archive held entirely in memory.
    pub fn open_bytes(bytes: Vec<u8>) -> Result<Self, OperationalError> {
        Self::open(Cursor::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_zip(entries: &[(&str, &[u8], zip::CompressionMethod)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, data, method) in entries {
                let options = zip::write::SimpleFileOptions::default().compression_method(*method);
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn detects_stored_leading_mimetype() {
        let bytes = build_zip(&[
            ("mimetype", b"application/epub+zip", zip::CompressionMethod::Stored),
            ("META-INF/container.xml", b"<x/>", zip::CompressionMethod::Deflated),
        ]);
        let container = ZipContainer::open_bytes(bytes).unwrap();
        assert!(container.first_entry_is_stored_mimetype());
        assert!(!container.mimetype_entry_out_of_place());
    }

    #[test]
    fn detects_out_of_place_mimetype() {
        let bytes = build_zip(&[
            ("README", b"not mimetype", zip::CompressionMethod::Stored),
            ("mimetype", b"application/epub+zip", zip::CompressionMethod::Stored),
        ]);
        let container = ZipContainer::open_bytes(bytes).unwrap();
        assert!(!container.first_entry_is_stored_mimetype());
        assert!(container.mimetype_entry_out_of_place());
    }

    #[test]
    fn rejects_non_zip_bytes() {
        let err = ZipContainer::open_bytes(b"not a zip file".to_vec());
        assert!(matches!(err, Err(OperationalError::NotAZip { .. })));
    }
}
