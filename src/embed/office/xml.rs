//! Minimal XML tree for Office parts
//! Author: kartik4091
//!
//! Keeps element order, attributes and text verbatim so untouched markup
//! survives a read-modify-write cycle. Namespaces are treated as part of the
//! qualified name.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

fn element_from(start: &BytesStart<'_>) -> Result<Element> {
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        attrs,
        children: Vec::new(),
    })
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parses a complete part; the root element is returned
    pub fn parse(bytes: &[u8]) -> Result<Element> {
        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(false);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::malformed("unbalanced XML end tag"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text.unescape()?.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                        parent.children.push(Node::Text(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::malformed("unterminated XML element"));
        }
        root.ok_or_else(|| Error::malformed("XML part has no root element"))
    }

    /// Parses a markup snippet built in code
    pub fn fragment(markup: &str) -> Result<Element> {
        Self::parse(markup.as_bytes())
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut out = String::with_capacity(1024);
        out.push_str(DECLARATION);
        self.write(&mut out);
        out.into_bytes()
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(element) => element.write(out),
                Node::Text(text) => out.push_str(&escape(text.as_str())),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    /// Name without namespace prefix
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Child `name`, appended when missing
    pub fn ensure_child(&mut self, name: &str) -> &mut Element {
        let position = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == name));
        let index = match position {
            Some(index) => index,
            None => {
                self.children.push(Node::Element(Element::new(name)));
                self.children.len() - 1
            }
        };
        match &mut self.children[index] {
            Node::Element(e) => e,
            Node::Text(_) => unreachable!("index points at an element"),
        }
    }

    pub fn push(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    pub fn set_text(&mut self, text: &str) {
        self.children = vec![Node::Text(text.to_string())];
    }

    /// Concatenated text of this element's direct text children
    pub fn own_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Paths (child indices) of every descendant named `name`, in document
    /// order. Matches are not searched for nested matches.
    pub fn find_paths(&self, name: &str) -> Vec<Vec<usize>> {
        let mut found = Vec::new();
        let mut path = Vec::new();
        self.collect_paths(name, &mut path, &mut found);
        found
    }

    fn collect_paths(&self, name: &str, path: &mut Vec<usize>, found: &mut Vec<Vec<usize>>) {
        for (index, child) in self.children.iter().enumerate() {
            if let Node::Element(element) = child {
                path.push(index);
                if element.name == name {
                    found.push(path.clone());
                } else {
                    element.collect_paths(name, path, found);
                }
                path.pop();
            }
        }
    }

    pub fn at_path(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for index in path {
            current = match current.children.get(*index)? {
                Node::Element(e) => e,
                Node::Text(_) => return None,
            };
        }
        Some(current)
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for index in path {
            current = match current.children.get_mut(*index)? {
                Node::Element(e) => e,
                Node::Text(_) => return None,
            };
        }
        Some(current)
    }

    /// Every descendant named `name`
    pub fn descendants<'a>(&'a self, name: &'a str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        for child in self.elements() {
            if child.name == name {
                out.push(child);
            }
            out.extend(child.descendants(name));
        }
        out
    }

    /// Concatenated text of every `text_tag` descendant
    pub fn text_of(&self, text_tag: &str) -> String {
        self.descendants(text_tag).iter().map(|t| t.own_text()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t xml:space="preserve">Hello &amp; </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;

    #[test]
    fn test_parse_and_query() {
        let root = Element::parse(DOC.as_bytes()).unwrap();
        assert_eq!(root.name, "w:document");
        assert_eq!(root.local_name(), "document");
        assert_eq!(root.attr("xmlns:w"), Some("urn:w"));
        let paragraphs = root.find_paths("w:p");
        assert_eq!(paragraphs.len(), 1);
        let paragraph = root.at_path(&paragraphs[0]).unwrap();
        assert_eq!(paragraph.text_of("w:t"), "Hello & world");
    }

    #[test]
    fn test_serialization_escapes_and_round_trips() {
        let root = Element::parse(DOC.as_bytes()).unwrap();
        let xml = root.to_xml();
        let text = String::from_utf8(xml.clone()).unwrap();
        assert!(text.contains("Hello &amp; "));
        assert!(text.contains("<w:sectPr/>"));
        assert_eq!(Element::parse(&xml).unwrap(), root);
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(Element::parse(b"<a><b></a>").is_err());
        assert!(Element::parse(b"").is_err());
    }

    #[test]
    fn test_ensure_child_appends_once() {
        let mut root = Element::new("cp:coreProperties");
        root.ensure_child("dc:description").set_text("x");
        root.ensure_child("dc:description").set_text("y");
        assert_eq!(root.elements().count(), 1);
        assert_eq!(root.child("dc:description").unwrap().own_text(), "y");
    }
}
