//! Minimal owned XML tree for OOXML parts.
//!
//! WordprocessingML is edited in place (cell text, paragraph alignment,
//! inline drawings), so the part is read into a tree with `quick-xml`,
//! mutated, and written back. Names are kept qualified (`w:tc`) because
//! Word always uses the same prefixes; no namespace resolution is done.

use std::borrow::Cow;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::DocxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// A parsed XML part: optional declaration plus one root element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub has_declaration: bool,
    pub root: Element,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Direct child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(name))
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.is(name))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.is(name))
    }

    pub fn children_named_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.elements_mut().filter(move |e| e.is(name))
    }

    /// Removes every direct child element with the given name.
    pub fn remove_children(&mut self, name: &str) {
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if e.is(name)));
    }

    /// Depth-first visit of this element and all descendant elements.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        visit(self);
        for child in self.elements() {
            child.walk(visit);
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(t) | Node::CData(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
            Node::Comment(_) => {}
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Parsing
// ────────────────────────────────────────────────────────────────────────────

pub fn parse(xml: &str) -> Result<XmlDocument, DocxError> {
    let mut reader = Reader::from_str(xml);
    // Run text keeps its spaces; `xml:space="preserve"` is meaningful in OOXML.
    reader.trim_text(false);

    let mut has_declaration = false;
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_error(reader.buffer_position(), e))?;
        match event {
            Event::Decl(_) => has_declaration = true,
            Event::Start(e) => stack.push(start_element(&e)?),
            Event::Empty(e) => {
                let element = start_element(&e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DocxError::Xml("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(e) => {
                if let Some(parent) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| xml_error(reader.buffer_position(), err))?;
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(e) => {
                if let Some(parent) = stack.last_mut() {
                    let raw = e.into_inner();
                    parent
                        .children
                        .push(Node::CData(String::from_utf8_lossy(&raw).into_owned()));
                }
            }
            Event::Comment(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::Comment(String::from_utf8_lossy(&e).into_owned()));
                }
            }
            Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(DocxError::Xml(format!(
            "unclosed element <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }

    let root = root.ok_or_else(|| DocxError::Xml("document has no root element".to_string()))?;
    Ok(XmlDocument {
        has_declaration,
        root,
    })
}

/// Parses a standalone snippet with a single root element.
pub fn parse_fragment(xml: &str) -> Result<Element, DocxError> {
    parse(xml).map(|doc| doc.root)
}

fn start_element(e: &BytesStart<'_>) -> Result<Element, DocxError> {
    let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(|err| DocxError::Xml(format!("invalid attribute: {err}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| DocxError::Xml(format!("invalid attribute value: {err}")))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocxError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(DocxError::Xml("multiple root elements".to_string())),
    }
    Ok(())
}

fn xml_error(position: usize, err: quick_xml::Error) -> DocxError {
    DocxError::Xml(format!("at byte {position}: {err}"))
}

// ────────────────────────────────────────────────────────────────────────────
// Writing
// ────────────────────────────────────────────────────────────────────────────

pub fn write(doc: &XmlDocument) -> Result<Vec<u8>, DocxError> {
    let mut writer = Writer::new(Vec::new());
    if doc.has_declaration {
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(write_error)?;
        writer.get_mut().extend_from_slice(b"\r\n");
    }
    write_element(&mut writer, &doc.root).map_err(write_error)?;
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
            Node::CData(t) => writer.write_event(Event::CData(BytesCData::new(t.as_str())))?,
            Node::Comment(t) => writer.write_event(Event::Comment(BytesText::from_escaped(
                Cow::Borrowed(t.as_str()),
            )))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))
}

fn write_error(err: quick_xml::Error) -> DocxError {
    DocxError::Xml(format!("failed to write XML: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_structure_and_text() {
        let doc = parse(
            r#"<?xml version="1.0"?><w:p><w:r><w:t xml:space="preserve"> a &amp; b </w:t></w:r><w:r/></w:p>"#,
        )
        .unwrap();
        assert!(doc.has_declaration);
        assert_eq!(doc.root.name, "w:p");
        assert_eq!(doc.root.elements().count(), 2);
        assert_eq!(doc.root.text(), " a & b ");
        let t = doc.root.child("w:r").unwrap().child("w:t").unwrap();
        assert_eq!(t.attr("xml:space"), Some("preserve"));
    }

    #[test]
    fn test_write_escapes_text_and_attributes() {
        let mut root = Element::new("w:t").with_attr("w:val", "a\"b");
        root.children.push(Node::Text("<x> & y".to_string()));
        let bytes = write(&XmlDocument {
            has_declaration: false,
            root,
        })
        .unwrap();
        let out = String::from_utf8(bytes).unwrap();
        assert!(out.contains("&lt;x&gt; &amp; y"), "got: {out}");
        assert!(out.contains("w:val=\"a&quot;b\""), "got: {out}");
    }

    #[test]
    fn test_reparse_after_write_is_stable() {
        let src = r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>姓名</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;
        let first = parse(src).unwrap();
        let written = write(&first).unwrap();
        let second = parse(std::str::from_utf8(&written).unwrap()).unwrap();
        assert_eq!(first.root, second.root);
    }

    #[test]
    fn test_mismatched_tags_are_rejected() {
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("<a>").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_remove_children_only_touches_named_elements() {
        let mut el = parse_fragment("<p><x/><y/><x/></p>").unwrap();
        el.remove_children("x");
        assert_eq!(el.elements().count(), 1);
        assert!(el.child("y").is_some());
    }
}
