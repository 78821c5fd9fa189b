//! OOXML word-processing package access.
//!
//! A `.docx` file is a zip archive. Only the main document part is parsed;
//! every other part is carried through untouched unless the writer has to
//! register an embedded image.

pub mod media;
pub mod table;
pub mod xml;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use thiserror::Error;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use self::xml::{Element, XmlDocument};

const PACKAGE_RELS: &str = "_rels/.rels";
const DEFAULT_MAIN_PART: &str = "word/document.xml";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a valid zip container: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("package part '{0}' is missing")]
    MissingPart(String),

    #[error("unsupported image: {0}")]
    Image(String),
}

struct Part {
    data: Vec<u8>,
    compression: CompressionMethod,
}

/// An in-memory word-processing package with its main document parsed.
pub struct DocxPackage {
    parts: BTreeMap<String, Part>,
    /// Zip entry order of the source archive, kept for output.
    order: Vec<String>,
    main_part: String,
    document: XmlDocument,
}

impl DocxPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = BTreeMap::new();
        let mut order = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let compression = file.compression();
            // The declared size is untrusted; grow as bytes arrive.
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            order.push(name.clone());
            parts.insert(name, Part { data, compression });
        }

        let main_part = resolve_main_part(&parts)?;
        let document_xml = parts
            .get(&main_part)
            .ok_or_else(|| DocxError::MissingPart(main_part.clone()))?;
        let text = std::str::from_utf8(&document_xml.data)
            .map_err(|e| DocxError::Xml(format!("{main_part} is not UTF-8: {e}")))?;
        let document = xml::parse(text)?;

        debug!(parts = order.len(), main_part = %main_part, "Loaded docx package");

        Ok(Self {
            parts,
            order,
            main_part,
            document,
        })
    }

    /// Root element of the main document part (`w:document`).
    pub fn document(&self) -> &Element {
        &self.document.root
    }

    pub fn document_mut(&mut self) -> &mut Element {
        &mut self.document.root
    }

    /// Path of the main document part, e.g. `word/document.xml`.
    pub fn main_part(&self) -> &str {
        &self.main_part
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(|p| p.data.as_slice())
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Adds or replaces a part. New parts are appended to the archive.
    pub fn put_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.get_mut(name) {
            Some(part) => part.data = data,
            None => {
                self.order.push(name.to_string());
                self.parts.insert(
                    name.to_string(),
                    Part {
                        data,
                        compression: CompressionMethod::Deflated,
                    },
                );
            }
        }
    }

    /// Serializes the package, writing the current main document tree.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let document_xml = xml::write(&self.document)?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for name in &self.order {
            let Some(part) = self.parts.get(name) else {
                continue;
            };
            let compression = match part.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(compression);
            writer.start_file(name.as_str(), options)?;
            if *name == self.main_part {
                writer.write_all(&document_xml)?;
            } else {
                writer.write_all(&part.data)?;
            }
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

/// Finds the main document part through the package relationships,
/// falling back to the conventional location.
fn resolve_main_part(parts: &BTreeMap<String, Part>) -> Result<String, DocxError> {
    if let Some(rels) = parts.get(PACKAGE_RELS) {
        let text = String::from_utf8_lossy(&rels.data);
        let rels = xml::parse(&text)?;
        let target = rels
            .root
            .children_named("Relationship")
            .find(|r| {
                r.attr("Type")
                    .map(|t| t.ends_with(OFFICE_DOCUMENT_REL))
                    .unwrap_or(false)
            })
            .and_then(|r| r.attr("Target"))
            .map(|t| t.trim_start_matches('/').to_string());
        if let Some(target) = target {
            if parts.contains_key(&target) {
                return Ok(target);
            }
        }
    }

    if parts.contains_key(DEFAULT_MAIN_PART) {
        Ok(DEFAULT_MAIN_PART.to_string())
    } else {
        Err(DocxError::MissingPart(DEFAULT_MAIN_PART.to_string()))
    }
}
