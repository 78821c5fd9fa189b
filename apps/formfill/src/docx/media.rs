//! Inline picture embedding.
//!
//! Registers an image part with its relationship and content type, then
//! builds `w:drawing` elements that reference it.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use super::xml::{self, Element};
use super::{DocxError, DocxPackage};

const CONTENT_TYPES: &str = "[Content_Types].xml";
const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Namespaces the drawing markup needs on the document root.
const DRAWING_NAMESPACES: &[(&str, &str)] = &[
    (
        "xmlns:wp",
        "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing",
    ),
    ("xmlns:a", "http://schemas.openxmlformats.org/drawingml/2006/main"),
    ("xmlns:pic", "http://schemas.openxmlformats.org/drawingml/2006/picture"),
    (
        "xmlns:r",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
    ),
];

/// English Metric Units per centimetre.
pub const EMU_PER_CM: f64 = 360_000.0;

/// An image part registered in the package.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub rel_id: String,
    pub file_name: String,
    pub width_px: u32,
    pub height_px: u32,
}

impl EmbeddedImage {
    /// Extent in EMU for a picture `width_cm` wide, keeping the aspect ratio.
    pub fn extent(&self, width_cm: f64) -> (u64, u64) {
        let cx = (width_cm * EMU_PER_CM).round();
        let cy = cx * f64::from(self.height_px) / f64::from(self.width_px.max(1));
        (cx as u64, cy.round() as u64)
    }
}

/// Adds `bytes` as a media part of the main document.
///
/// Only PNG and JPEG are accepted; the pixel size is read so drawings can be
/// scaled without distortion.
pub fn add_image(package: &mut DocxPackage, bytes: &[u8]) -> Result<EmbeddedImage, DocxError> {
    let format = image::guess_format(bytes)
        .map_err(|e| DocxError::Image(format!("unrecognised image data: {e}")))?;
    let (extension, content_type) = match format {
        ImageFormat::Png => ("png", "image/png"),
        ImageFormat::Jpeg => ("jpeg", "image/jpeg"),
        other => {
            return Err(DocxError::Image(format!(
                "{other:?} is not supported, use PNG or JPEG"
            )))
        }
    };
    let (width_px, height_px) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| DocxError::Image(format!("cannot read image size: {e}")))?;

    let (part_dir, rels_path) = part_locations(package.main_part());
    let file_name = unique_media_name(package, &part_dir, extension);
    package.put_part(&format!("{part_dir}media/{file_name}"), bytes.to_vec());

    let rel_id = add_relationship(package, &rels_path, &format!("media/{file_name}"))?;
    ensure_default_content_type(package, extension, content_type)?;
    ensure_drawing_namespaces(package.document_mut());

    Ok(EmbeddedImage {
        rel_id,
        file_name,
        width_px,
        height_px,
    })
}

/// Directory of the main part (with trailing slash) and its rels part path.
fn part_locations(main_part: &str) -> (String, String) {
    match main_part.rsplit_once('/') {
        Some((dir, file)) => (format!("{dir}/"), format!("{dir}/_rels/{file}.rels")),
        None => (String::new(), format!("_rels/{main_part}.rels")),
    }
}

fn unique_media_name(package: &DocxPackage, part_dir: &str, extension: &str) -> String {
    (1..)
        .map(|n| format!("formfill_photo{n}.{extension}"))
        .find(|name| !package.has_part(&format!("{part_dir}media/{name}")))
        .unwrap_or_else(|| format!("formfill_photo.{extension}"))
}

fn add_relationship(
    package: &mut DocxPackage,
    rels_path: &str,
    target: &str,
) -> Result<String, DocxError> {
    let mut rels = match package.part(rels_path) {
        Some(data) => xml::parse(&String::from_utf8_lossy(data))?,
        None => xml::XmlDocument {
            has_declaration: true,
            root: Element::new("Relationships").with_attr("xmlns", RELS_NS),
        },
    };

    let next = rels
        .root
        .children_named("Relationship")
        .filter_map(|r| r.attr("Id"))
        .filter_map(|id| id.strip_prefix("rId"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    let rel_id = format!("rId{next}");

    rels.root = rels.root.with_child(
        Element::new("Relationship")
            .with_attr("Id", &rel_id)
            .with_attr("Type", IMAGE_REL_TYPE)
            .with_attr("Target", target),
    );
    package.put_part(rels_path, xml::write(&rels)?);
    Ok(rel_id)
}

fn ensure_default_content_type(
    package: &mut DocxPackage,
    extension: &str,
    content_type: &str,
) -> Result<(), DocxError> {
    let mut types = match package.part(CONTENT_TYPES) {
        Some(data) => xml::parse(&String::from_utf8_lossy(data))?,
        None => xml::XmlDocument {
            has_declaration: true,
            root: Element::new("Types").with_attr("xmlns", CONTENT_TYPES_NS),
        },
    };

    let registered = types.root.children_named("Default").any(|d| {
        d.attr("Extension")
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false)
    });
    if registered {
        return Ok(());
    }

    let default = Element::new("Default")
        .with_attr("Extension", extension)
        .with_attr("ContentType", content_type);
    types.root.children.insert(0, xml::Node::Element(default));
    package.put_part(CONTENT_TYPES, xml::write(&types)?);
    Ok(())
}

fn ensure_drawing_namespaces(root: &mut Element) {
    for (prefix, uri) in DRAWING_NAMESPACES {
        if root.attr(prefix).is_none() {
            root.set_attr(prefix, uri);
        }
    }
}

/// Highest `wp:docPr` id already used in the document.
pub fn max_drawing_id(document: &Element) -> u32 {
    let mut max = 0;
    document.walk(&mut |e| {
        if e.is("wp:docPr") {
            if let Some(id) = e.attr("id").and_then(|v| v.parse::<u32>().ok()) {
                max = max.max(id);
            }
        }
    });
    max
}

/// Inline `w:drawing` showing `image` at `width_cm`.
pub fn inline_drawing(
    image: &EmbeddedImage,
    drawing_id: u32,
    width_cm: f64,
) -> Result<Element, DocxError> {
    let (cx, cy) = image.extent(width_cm);
    let rel_id = &image.rel_id;
    let name = &image.file_name;
    xml::parse_fragment(&format!(
        r#"<w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{drawing_id}" name="Picture {drawing_id}"/><wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{rel_id}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#
    ))
}
