//! In-memory `.docx` fixtures for tests.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::table;
use super::DocxPackage;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

/// Builds a document whose body holds one `w:tbl` per entry, rows of cells
/// given as plain strings. Rows may have different lengths.
pub(crate) fn build_docx(tables: &[&[&[&str]]]) -> Vec<u8> {
    let mut body = String::new();
    for rows in tables {
        body.push_str("<w:p><w:r><w:t>Form</w:t></w:r></w:p><w:tbl><w:tblPr/>");
        for row in rows.iter() {
            body.push_str("<w:tr>");
            for cell in row.iter() {
                body.push_str(&cell_xml(cell, ""));
            }
            body.push_str("</w:tr>");
        }
        body.push_str("</w:tbl>");
    }
    build_docx_from_body(&body)
}

/// XML for one cell; `tc_pr` is inserted verbatim inside `w:tcPr`.
pub(crate) fn cell_xml(text: &str, tc_pr: &str) -> String {
    let run = if text.is_empty() {
        String::new()
    } else {
        format!(r#"<w:r><w:rPr><w:sz w:val="21"/></w:rPr><w:t xml:space="preserve">{text}</w:t></w:r>"#)
    };
    format!(r#"<w:tc><w:tcPr><w:tcW w:w="2000" w:type="dxa"/>{tc_pr}</w:tcPr><w:p>{run}</w:p></w:tc>"#)
}

pub(crate) fn build_docx_from_body(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/document.xml", document.as_str()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS),
        ("word/styles.xml", "<w:styles xmlns:w=\"urn:w\"/>"),
    ] {
        writer
            .start_file(name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Cell text grid of every table, as seen by the scanner.
pub(crate) fn cell_texts(bytes: &[u8]) -> Vec<Vec<Vec<String>>> {
    let package = DocxPackage::from_bytes(bytes).unwrap();
    table::tables(package.document())
        .iter()
        .map(|t| {
            table::rows(t)
                .iter()
                .map(|r| table::cells(r).iter().map(|c| table::cell_text(c)).collect())
                .collect()
        })
        .collect()
}

/// A small PNG of the given size.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
