//! An owned element tree built on top of `quick_xml`, for repeated read-only traversal.
//!
//! The validators here revisit the same document more than once (heading hierarchy across a
//! whole content document, nav-link resolution against the manifest, accessibility scans that
//! walk the same subtree several times), so this module trades zero-copy streaming for a simple
//! owned tree while keeping the same `quick_xml::Reader` event loop, decoding, and unescaping.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::Event;

/// An error produced while parsing a document into a tree.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("XML is not well-formed at byte {offset}: {source}")]
    Malformed {
        offset: usize,
        #[source]
        source: quick_xml::Error,
    },
    #[error("document has no root element")]
    NoRootElement,
}

/// A node in the parsed tree: either an element or a run of text.
#[derive(Clone, Debug)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML/XHTML element, with its qualified name, attributes, and children.
#[derive(Clone, Debug, Default)]
pub struct Element {
    /// The element's name as written, including any namespace prefix (`svg:title`).
    pub name: String,
    /// Attribute values, keyed by their name as written (including prefix, if any).
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    /// The attribute value for `name`, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The element name with any namespace prefix stripped (`svg:title` -> `title`).
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    /// Direct child elements (skipping text nodes).
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// The concatenated text content of this element and all its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.trim().to_owned()
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => {
                    out.push_str(text);
                }
                Node::Element(element) => element.collect_text(out),
            }
        }
    }

    /// Every descendant element, in document (pre-order) order. Does not include `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        for child in self.child_elements() {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }

    /// The first descendant (pre-order, self included) whose local name matches, if any.
    pub fn find(&self, local_name: &str) -> Option<&Element> {
        if self.local_name() == local_name {
            return Some(self);
        }
        self.child_elements().find_map(|child| child.find(local_name))
    }

    /// Every descendant (self included) whose local name matches, in document order.
    pub fn find_all(&self, local_name: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_matching(local_name, &mut out);
        out
    }

    fn collect_matching<'a>(&'a self, local_name: &str, out: &mut Vec<&'a Element>) {
        if self.local_name() == local_name {
            out.push(self);
        }
        for child in self.child_elements() {
            child.collect_matching(local_name, out);
        }
    }
}

/// Parse a whole document into an owned element tree.
///
/// `bytes` is expected to already be UTF-8 (EPUB/XHTML content is required to be); malformed
/// encoding is reported the same way as a structural parse error.
pub fn parse(bytes: &[u8]) -> Result<Element, XmlError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                stack.push(build_element(&reader, &start));
            }
            Ok(Event::Empty(start)) => {
                let element = build_element(&reader, &start);
                push_child(&mut stack, &mut root, Node::Element(element));
            }
            Ok(Event::End(_)) => {
                if let Some(finished) = stack.pop() {
                    push_child(&mut stack, &mut root, Node::Element(finished));
                }
            }
            Ok(Event::Text(text)) => {
                let decoded = text
                    .decode()
                    .map_err(|source| XmlError::Malformed { offset: position, source })?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| decoded.into_owned());
                if !unescaped.trim().is_empty() {
                    push_child(&mut stack, &mut root, Node::Text(unescaped));
                }
            }
            Ok(Event::CData(cdata)) => {
                let decoded = cdata
                    .decode()
                    .map_err(|source| XmlError::Malformed { offset: position, source })?;
                push_child(&mut stack, &mut root, Node::Text(decoded.into_owned()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(source) => return Err(XmlError::Malformed { offset: position, source }),
        }
    }

    root.ok_or(XmlError::NoRootElement)
}

fn build_element(reader: &Reader<&[u8]>, start: &quick_xml::events::BytesStart<'_>) -> Element {
    let name = reader
        .decoder()
        .decode(start.name().as_ref())
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(start.name().as_ref()).into_owned());

    let mut attributes = BTreeMap::new();
    for attribute in start.attributes().flatten() {
        let key = reader
            .decoder()
            .decode(attribute.key.as_ref())
            .map(|cow| cow.into_owned())
            .unwrap_or_default();
        let raw_value = reader
            .decoder()
            .decode(&attribute.value)
            .map(|cow| cow.into_owned())
            .unwrap_or_default();
        let value = quick_xml::escape::unescape(&raw_value)
            .map(|cow| cow.into_owned())
            .unwrap_or(raw_value);
        attributes.insert(key, value);
    }

    Element { name, attributes, children: Vec::new() }
}

fn push_child(stack: &mut [Element], root: &mut Option<Element>, node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if let Node::Element(element) = node {
        root.replace(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = parse(br#"<html lang="en"><body><p id="a">Hello</p></body></html>"#).unwrap();
        assert_eq!(doc.local_name(), "html");
        assert_eq!(doc.attr("lang"), Some("en"));

        let p = doc.find("p").unwrap();
        assert_eq!(p.attr("id"), Some("a"));
        assert_eq!(p.text_content(), "Hello");
    }

    #[test]
    fn self_closing_elements_have_no_children() {
        let doc = parse(br#"<body><img src="a.png"/><img src="b.png"/></body>"#).unwrap();
        assert_eq!(doc.find_all("img").len(), 2);
    }

    #[test]
    fn unescapes_entities_in_text_and_attributes() {
        let doc = parse(br#"<p title="Au &amp; Co">Tom &amp; Jerry</p>"#).unwrap();
        assert_eq!(doc.attr("title"), Some("Au & Co"));
        assert_eq!(doc.text_content(), "Tom & Jerry");
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(parse(b"<a><b></a>").is_err());
    }
}
