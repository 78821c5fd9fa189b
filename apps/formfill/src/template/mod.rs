//! Template scanning: finds the empty cells of every table, tags them in
//! place and renders the tables as pipe-table text for the prompts.

use tracing::debug;

use crate::docx::table;
use crate::docx::xml::Element;
use crate::docx::DocxPackage;
use crate::models::{CellLocation, Placeholder, PlaceholderKind, Tag};
use crate::profile::FieldTables;

/// Rendered in place of a photo slot.
pub const PHOTO_MARKER: &str = "[照片]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateScan {
    /// In tag order, which is table-major, row-major document order.
    pub placeholders: Vec<Placeholder>,
    /// Cells labelled as photo slots.
    pub photo_slots: Vec<CellLocation>,
    /// Pipe-table rendering of every table, tags shown in place.
    pub markdown: String,
}

impl TemplateScan {
    pub fn placeholder(&self, tag: Tag) -> Option<&Placeholder> {
        self.placeholders.iter().find(|p| p.tag == tag)
    }

    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }
}

pub struct TemplateScanner<'a> {
    tables: &'a FieldTables,
}

/// What the read pass decided for one cell.
enum CellRole {
    Merged,
    Photo,
    Filled(String),
    Empty,
}

impl<'a> TemplateScanner<'a> {
    pub fn new(tables: &'a FieldTables) -> Self {
        Self { tables }
    }

    /// Scans `package`, writing each placeholder's tag into its cell.
    pub fn scan(&self, package: &mut DocxPackage) -> TemplateScan {
        let mut placeholders = Vec::new();
        let mut photo_slots = Vec::new();
        let mut markdown = String::new();
        let mut next_tag = 1u32;

        for (t_idx, tbl) in table::tables(package.document()).into_iter().enumerate() {
            let rows = table::rows(tbl);
            if rows.is_empty() {
                continue;
            }
            let grid: Vec<Vec<&Element>> = rows.iter().map(|r| table::cells(r)).collect();
            let spans: Vec<Vec<usize>> = grid
                .iter()
                .map(|cells| cells.iter().map(|c| table::grid_span(c)).collect())
                .collect();
            let width = spans
                .iter()
                .map(|row| row.iter().sum::<usize>())
                .max()
                .unwrap_or(0);
            // Header text per grid column; a spanned header covers each of
            // its columns.
            let header_texts: Vec<String> = grid[0]
                .iter()
                .zip(&spans[0])
                .flat_map(|(c, span)| {
                    std::iter::repeat(table::cell_text(c).trim().to_string()).take(*span)
                })
                .collect();

            markdown.push_str(&format!("\n### 表格 {}\n\n", t_idx + 1));

            for (r_idx, cells) in grid.iter().enumerate() {
                let roles: Vec<CellRole> = cells.iter().map(|c| self.classify(c)).collect();
                let row_has_photo = roles.iter().any(|r| matches!(r, CellRole::Photo));

                let mut rendered: Vec<String> = Vec::with_capacity(width);
                for (c_idx, role) in roles.into_iter().enumerate() {
                    let location = CellLocation::from_indices(t_idx, r_idx, c_idx);
                    let grid_col = rendered.len();
                    let text = match role {
                        CellRole::Merged => String::new(),
                        CellRole::Photo => {
                            photo_slots.push(location);
                            PHOTO_MARKER.to_string()
                        }
                        CellRole::Filled(text) => escape_cell(&text),
                        CellRole::Empty => {
                            let tag = Tag::new(next_tag);
                            next_tag += 1;
                            let header = if r_idx > 0 {
                                header_texts.get(grid_col).cloned().unwrap_or_default()
                            } else {
                                String::new()
                            };
                            let kind = if row_has_photo {
                                PlaceholderKind::Photo
                            } else {
                                PlaceholderKind::Text
                            };
                            placeholders.push(Placeholder {
                                tag,
                                location,
                                header,
                                kind,
                            });
                            tag.to_string()
                        }
                    };
                    rendered.extend(std::iter::repeat(text).take(spans[r_idx][c_idx]));
                }
                rendered.resize(width, String::new());

                markdown.push_str(&format!("| {} |\n", rendered.join(" | ")));
                if r_idx == 0 {
                    markdown.push_str(&format!("| {} |\n", vec!["---"; width].join(" | ")));
                }
            }
        }

        let document = package.document_mut();
        for placeholder in &placeholders {
            let (t, r, c) = placeholder.location.indices();
            if let Some(cell) = table::cell_mut(document, t, r, c) {
                table::set_cell_text(cell, &placeholder.tag.to_string());
            }
        }

        debug!(
            placeholders = placeholders.len(),
            photo_slots = photo_slots.len(),
            markdown_chars = markdown.chars().count(),
            "Scanned template"
        );

        TemplateScan {
            placeholders,
            photo_slots,
            markdown,
        }
    }

    fn classify(&self, cell: &Element) -> CellRole {
        if table::is_merge_continuation(cell) {
            return CellRole::Merged;
        }
        let text = table::cell_text(cell);
        let text = text.trim();
        if self.tables.is_photo_label(text) {
            CellRole::Photo
        } else if text.is_empty() {
            CellRole::Empty
        } else {
            CellRole::Filled(text.to_string())
        }
    }
}

/// Keeps a cell on one pipe-table line.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::test_support::{build_docx, build_docx_from_body, cell_texts, cell_xml};

    fn scan(bytes: &[u8]) -> (TemplateScan, DocxPackage) {
        let tables = FieldTables::default();
        let mut package = DocxPackage::from_bytes(bytes).unwrap();
        let scan = TemplateScanner::new(&tables).scan(&mut package);
        (scan, package)
    }

    #[test]
    fn test_empty_cells_become_tagged_placeholders() {
        let bytes = build_docx(&[&[&["姓名", "性别"], &["", ""]]]);
        let (scan, package) = scan(&bytes);

        let tags: Vec<_> = scan.placeholders.iter().map(|p| p.tag.to_string()).collect();
        assert_eq!(tags, vec!["{1}", "{2}"]);
        assert_eq!(scan.placeholders[0].header, "姓名");
        assert_eq!(scan.placeholders[1].header, "性别");
        assert_eq!(scan.placeholders[1].location, CellLocation::from_indices(0, 1, 1));
        assert_eq!(scan.placeholders[0].kind, PlaceholderKind::Text);

        let written = cell_texts(&package.to_bytes().unwrap());
        assert_eq!(written[0][1], vec!["{1}", "{2}"]);
    }

    #[test]
    fn test_markdown_rendering() {
        let bytes = build_docx(&[&[&["姓名", "照片"], &["", ""]], &[&["备注"]]]);
        let (scan, _) = scan(&bytes);
        assert_eq!(
            scan.markdown,
            "\n### 表格 1\n\n| 姓名 | [照片] |\n| --- | --- |\n| {1} | {2} |\n\n### 表格 2\n\n| 备注 |\n| --- |\n"
        );
    }

    #[test]
    fn test_photo_slots_are_not_placeholders() {
        let bytes = build_docx(&[&[&["姓名", "", "照片"], &["性别", "", ""]]]);
        let (scan, _) = scan(&bytes);

        assert_eq!(scan.photo_slots, vec![CellLocation::from_indices(0, 0, 2)]);
        assert_eq!(scan.placeholders.len(), 3);
        // The frame beside the label shares its row.
        assert_eq!(scan.placeholders[0].kind, PlaceholderKind::Photo);
        assert_eq!(scan.placeholders[1].kind, PlaceholderKind::Text);
    }

    #[test]
    fn test_first_row_placeholders_have_no_header() {
        let bytes = build_docx(&[&[&["", "姓名"], &["", "张三"]]]);
        let (scan, _) = scan(&bytes);
        assert_eq!(scan.placeholders[0].header, "");
        // Header comes from the pre-tag text, never from another tag.
        assert_eq!(scan.placeholders[1].header, "");
        assert_eq!(scan.placeholders[1].location.row, 2);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let bytes = build_docx(&[&[&["a", "b", "c"], &[""]]]);
        let (scan, _) = scan(&bytes);
        assert_eq!(scan.placeholders.len(), 1);
        assert!(scan.markdown.contains("| {1} |  |  |\n"));
    }

    #[test]
    fn test_merge_continuation_cells_are_skipped() {
        let body = format!(
            "<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>",
            cell_xml("地址", r#"<w:vMerge w:val="restart"/>"#),
            cell_xml("x", ""),
            cell_xml("", "<w:vMerge/>"),
            cell_xml("", ""),
        );
        let (scan, _) = scan(&build_docx_from_body(&body));
        assert_eq!(scan.placeholders.len(), 1);
        assert_eq!(scan.placeholders[0].location.column, 2);
    }

    #[test]
    fn test_spanned_header_covers_its_grid_columns() {
        let body = format!(
            "<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}{}</w:tr></w:tbl>",
            cell_xml("姓名", r#"<w:gridSpan w:val="2"/>"#),
            cell_xml("性别", ""),
            cell_xml("x", ""),
            cell_xml("", ""),
            cell_xml("", ""),
        );
        let (scan, package) = scan(&build_docx_from_body(&body));

        let headers: Vec<_> = scan.placeholders.iter().map(|p| p.header.as_str()).collect();
        assert_eq!(headers, vec!["姓名", "性别"]);
        // Locations stay physical so write-back reaches the right cell.
        assert_eq!(scan.placeholders[1].location, CellLocation::from_indices(0, 1, 2));
        assert_eq!(
            scan.markdown,
            "\n### 表格 1\n\n| 姓名 | 姓名 | 性别 |\n| --- | --- | --- |\n| x | {1} | {2} |\n"
        );
        let written = cell_texts(&package.to_bytes().unwrap());
        assert_eq!(written[0][1], vec!["x", "{1}", "{2}"]);
    }

    #[test]
    fn test_scanning_is_stable() {
        let bytes = build_docx(&[&[&["姓名", ""], &["", "x"]], &[&[""]]]);
        let (first, _) = scan(&bytes);
        let (second, _) = scan(&bytes);
        assert_eq!(first, second);
        assert_eq!(first.placeholders.last().map(|p| p.location.table), Some(2));
    }

    #[test]
    fn test_full_template_has_no_placeholders() {
        let bytes = build_docx(&[&[&["姓名", "张三"]]]);
        let (scan, _) = scan(&bytes);
        assert!(scan.is_empty());
    }

    #[test]
    fn test_escape_cell_keeps_one_line() {
        assert_eq!(escape_cell("a|b\n c"), "a\\|b c");
    }
}
