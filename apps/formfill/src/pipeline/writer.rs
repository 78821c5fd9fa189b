//! Write-back of final values and the photo into the tagged template.

use tracing::debug;

use crate::docx::table::{self, Alignment};
use crate::docx::{media, DocxError, DocxPackage};
use crate::models::{CellLocation, FillMap, Placeholder};

/// Physical width of an embedded photo.
pub const PHOTO_WIDTH_CM: f64 = 3.5;

pub struct DocumentWriter;

impl DocumentWriter {
    /// Replaces every placeholder tag with its accepted value, or with
    /// nothing when the placeholder stayed missing. Filled cells are left
    /// aligned.
    pub fn apply_values(package: &mut DocxPackage, placeholders: &[Placeholder], accepted: &FillMap) {
        let document = package.document_mut();
        for placeholder in placeholders {
            let (t, r, c) = placeholder.location.indices();
            let Some(cell) = table::cell_mut(document, t, r, c) else {
                continue;
            };
            match accepted.get(placeholder.tag).filter(|v| !v.is_empty()) {
                Some(value) => {
                    table::set_cell_text(cell, value);
                    table::set_alignment(cell, Alignment::Left);
                }
                None => table::set_cell_text(cell, ""),
            }
        }
    }

    /// Clears each photo slot and puts a centered picture in it. The image
    /// part is stored once and shared by all slots.
    pub fn embed_photo(
        package: &mut DocxPackage,
        slots: &[CellLocation],
        photo: &[u8],
    ) -> Result<(), DocxError> {
        if slots.is_empty() {
            return Ok(());
        }
        let image = media::add_image(package, photo)?;
        let mut drawing_id = media::max_drawing_id(package.document());

        for slot in slots {
            drawing_id += 1;
            let drawing = media::inline_drawing(&image, drawing_id, PHOTO_WIDTH_CM)?;
            let (t, r, c) = slot.indices();
            let Some(cell) = table::cell_mut(package.document_mut(), t, r, c) else {
                continue;
            };
            table::set_cell_text(cell, "");
            table::set_alignment(cell, Alignment::Center);
            table::append_run(cell, drawing);
        }

        debug!(slots = slots.len(), image = %image.file_name, "Embedded photo");
        Ok(())
    }
}
