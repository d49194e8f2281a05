//! A small namespaced mixed-content tree.
//!
//! The parser needs element/text interleaving (for inline tags) and
//! namespace resolution (to tell `xliff` elements from vendor-extension
//! ones), nothing more. The tree is read-only input for segment extraction;
//! files are never serialized back from it.

use quick_xml::{
    events::{BytesStart, Event},
    name::{Namespace, ResolveResult},
    reader::NsReader,
};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Resolved namespace URI, if the element is bound to one.
    pub namespace: Option<String>,
    /// Local name without prefix.
    pub name: String,
    /// Attributes in document order, keyed by their qualified name.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Looks an attribute up by local name, ignoring any prefix.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| local_part(key) == local_name)
            .map(|(_, value)| value.as_str())
    }

    /// True if this element has the given namespace and local name.
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn find_child(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(namespace, name))
    }

    /// Collects every descendant (depth-first, document order) matching `predicate`
    /// without descending into matches.
    pub fn find_descendants<'a>(
        &'a self,
        predicate: &dyn Fn(&Element) -> bool,
        out: &mut Vec<&'a Element>,
    ) {
        for child in self.child_elements() {
            if predicate(child) {
                out.push(child);
            } else {
                child.find_descendants(predicate, out);
            }
        }
    }

    /// Appends text, merging with a trailing text node.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    pub fn push_element(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }
}

fn local_part(key: &str) -> &str {
    key.rsplit_once(':').map_or(key, |(_, local)| local)
}

/// Parses a whole document and returns its root element.
pub fn parse_document(text: &str) -> Result<Element, Error> {
    let mut reader = NsReader::from_reader(text.as_bytes());
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_resolved_event_into(&mut buf)? {
            (ns, Event::Start(e)) => stack.push(start_element(ns, &e)?),
            (ns, Event::Empty(e)) => {
                let element = start_element(ns, &e)?;
                attach(&mut stack, &mut root, element);
            }
            (_, Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Format("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            (_, Event::Text(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.push_text(&e.unescape()?);
                }
            }
            (_, Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.push_text(&String::from_utf8_lossy(&e));
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| Error::missing_metadata("document has no root element"))
}

fn start_element(ns: ResolveResult, e: &BytesStart) -> Result<Element, Error> {
    let namespace = match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    };
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        namespace,
        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.push_element(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "urn:test";

    #[test]
    fn test_parse_mixed_content() {
        let root = parse_document(r#"<r xmlns="urn:test">a<b id="1">c</b>d<e/>&amp;f</r>"#)
            .unwrap();
        assert!(root.is(NS, "r"));
        assert_eq!(root.children.len(), 5);
        assert_eq!(root.children[0], Node::Text("a".to_string()));
        assert!(matches!(&root.children[3], Node::Element(e) if e.name == "e"));
        assert_eq!(root.children[4], Node::Text("&f".to_string()));
        let b = root.find_child(NS, "b").unwrap();
        assert_eq!(b.attribute("id"), Some("1"));
    }

    #[test]
    fn test_prefixed_namespace_is_resolved() {
        let root = parse_document(
            r#"<r xmlns="urn:test" xmlns:v="urn:vendor"><v:seg id="1" v:x="2"/></r>"#,
        )
        .unwrap();
        let seg = root.find_child("urn:vendor", "seg").unwrap();
        assert_eq!(seg.attribute("id"), Some("1"));
        assert_eq!(seg.attribute("x"), Some("2"));
        assert!(root.find_child(NS, "seg").is_none());
    }

    #[test]
    fn test_find_descendants_stops_at_match() {
        let root = parse_document(
            r#"<r xmlns="urn:test"><g><m id="1"><m id="inner"/></m></g><m id="2"/></r>"#,
        )
        .unwrap();
        let mut found = Vec::new();
        root.find_descendants(&|e: &Element| e.name == "m", &mut found);
        let ids: Vec<_> = found.iter().filter_map(|e| e.attribute("id")).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_malformed_document() {
        assert!(parse_document("<r><a></r>").is_err());
    }
}
