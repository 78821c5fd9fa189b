//! Table, row and cell access over a parsed WordprocessingML body.

use super::xml::{Element, Node};

pub const TABLE: &str = "w:tbl";
pub const ROW: &str = "w:tr";
pub const CELL: &str = "w:tc";
const BODY: &str = "w:body";
const PARAGRAPH: &str = "w:p";
const PARAGRAPH_PROPS: &str = "w:pPr";
const RUN: &str = "w:r";
const RUN_PROPS: &str = "w:rPr";
const TEXT: &str = "w:t";
const CELL_PROPS: &str = "w:tcPr";
const JUSTIFICATION: &str = "w:jc";

/// `w:pPr` children that must follow `w:jc` in schema order.
const AFTER_JC: &[&str] = &[
    "w:textDirection",
    "w:textAlignment",
    "w:textboxTightWrap",
    "w:outlineLvl",
    "w:divId",
    "w:cnfStyle",
    "w:rPr",
    "w:sectPr",
    "w:pPrChange",
];

/// Run content that never contributes to visible cell text.
const OPAQUE: &[&str] = &["w:drawing", "w:pict", "mc:AlternateContent", "w:del", "w:instrText"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
}

impl Alignment {
    fn as_val(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
        }
    }
}

/// Top-level tables of the document body, in document order.
pub fn tables(document: &Element) -> Vec<&Element> {
    document
        .child(BODY)
        .map(|body| body.children_named(TABLE).collect())
        .unwrap_or_default()
}

pub fn rows(table: &Element) -> Vec<&Element> {
    table.children_named(ROW).collect()
}

pub fn cells(row: &Element) -> Vec<&Element> {
    row.children_named(CELL).collect()
}

/// Mutable access to one cell by 0-based table/row/cell index.
pub fn cell_mut(
    document: &mut Element,
    table: usize,
    row: usize,
    cell: usize,
) -> Option<&mut Element> {
    document
        .child_mut(BODY)?
        .children_named_mut(TABLE)
        .nth(table)?
        .children_named_mut(ROW)
        .nth(row)?
        .children_named_mut(CELL)
        .nth(cell)
}

/// Visible text of a cell: paragraphs joined by newlines.
pub fn cell_text(cell: &Element) -> String {
    cell.children_named(PARAGRAPH)
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn paragraph_text(paragraph: &Element) -> String {
    let mut out = String::new();
    push_run_text(paragraph, &mut out);
    out
}

fn push_run_text(element: &Element, out: &mut String) {
    for child in element.elements() {
        match child.name.as_str() {
            TEXT => out.push_str(&child.text()),
            "w:tab" => out.push('\t'),
            "w:br" | "w:cr" => out.push('\n'),
            name if OPAQUE.contains(&name) => {}
            _ => push_run_text(child, out),
        }
    }
}

/// True for the lower cells of a vertical merge; their content belongs to
/// the cell where the merge restarts.
pub fn is_merge_continuation(cell: &Element) -> bool {
    cell.child(CELL_PROPS)
        .and_then(|props| props.child("w:vMerge"))
        .map(|merge| merge.attr("w:val").map_or(true, |v| v == "continue"))
        .unwrap_or(false)
}

/// Number of grid columns the cell covers (`w:gridSpan`, at least 1).
pub fn grid_span(cell: &Element) -> usize {
    cell.child(CELL_PROPS)
        .and_then(|props| props.child("w:gridSpan"))
        .and_then(|span| span.attr("w:val"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

/// Replaces the cell content with a single paragraph holding `text`.
///
/// Cell properties are kept. The first paragraph's properties and the first
/// run's properties are reused so the template's font settings survive.
pub fn set_cell_text(cell: &mut Element, text: &str) {
    let first_paragraph = cell.child(PARAGRAPH);
    let paragraph_props = first_paragraph
        .and_then(|p| p.child(PARAGRAPH_PROPS))
        .cloned();
    let run_props = first_paragraph
        .and_then(|p| p.elements().find(|e| e.is(RUN)))
        .and_then(|r| r.child(RUN_PROPS))
        .cloned();

    cell.children
        .retain(|n| matches!(n, Node::Element(e) if e.is(CELL_PROPS)));

    let mut paragraph = Element::new(PARAGRAPH);
    if let Some(props) = paragraph_props {
        paragraph.children.push(Node::Element(props));
    }
    if !text.is_empty() {
        paragraph.children.push(Node::Element(text_run(text, run_props)));
    }
    cell.children.push(Node::Element(paragraph));
}

fn text_run(text: &str, run_props: Option<Element>) -> Element {
    let mut run = Element::new(RUN);
    if let Some(props) = run_props {
        run.children.push(Node::Element(props));
    }
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run.children.push(Node::Element(Element::new("w:br")));
        }
        if !line.is_empty() {
            let mut t = Element::new(TEXT).with_attr("xml:space", "preserve");
            t.children.push(Node::Text(line.to_string()));
            run.children.push(Node::Element(t));
        }
    }
    run
}

/// Forces the alignment of every paragraph directly inside the cell.
pub fn set_alignment(cell: &mut Element, alignment: Alignment) {
    for paragraph in cell.children_named_mut(PARAGRAPH) {
        if paragraph.child(PARAGRAPH_PROPS).is_none() {
            paragraph
                .children
                .insert(0, Node::Element(Element::new(PARAGRAPH_PROPS)));
        }
        let Some(props) = paragraph.child_mut(PARAGRAPH_PROPS) else {
            continue;
        };
        props.remove_children(JUSTIFICATION);
        let jc = Element::new(JUSTIFICATION).with_attr("w:val", alignment.as_val());
        let position = props
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if AFTER_JC.contains(&e.name.as_str())))
            .unwrap_or(props.children.len());
        props.children.insert(position, Node::Element(jc));
    }
}

/// Appends a run holding `content` (e.g. a `w:drawing`) to the cell's first
/// paragraph, creating the paragraph if the cell has none.
pub fn append_run(cell: &mut Element, content: Element) {
    if cell.child(PARAGRAPH).is_none() {
        cell.children.push(Node::Element(Element::new(PARAGRAPH)));
    }
    if let Some(paragraph) = cell.child_mut(PARAGRAPH) {
        paragraph
            .children
            .push(Node::Element(Element::new(RUN).with_child(content)));
    }
}
