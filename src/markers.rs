//! Conversion between inline formatting elements and host-facing markers.
//!
//! The host editor never sees XLIFF inline markup. A paired `<g id="10">`
//! element becomes `<10>…</10>` and a standalone `<x id="5"/>` (or `bx`/`ex`)
//! becomes `<5/>`. Marker ids match `[A-Za-z0-9_]+`.
//!
//! ```rust
//! use sdlpack::markers::{MismatchPolicy, from_markers, to_markers};
//!
//! let nodes = from_markers("Hello <10>world</10><5/>", MismatchPolicy::Tolerant)?;
//! assert_eq!(to_markers(&nodes), "Hello <10>world</10><5/>");
//! # Ok::<(), sdlpack::Error>(())
//! ```

use std::collections::HashMap;

use lazy_static::lazy_static;
use quick_xml::escape::{escape, partial_escape};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    xml::{Element, Node},
};

lazy_static! {
    static ref MARKER_REGEX: Regex = Regex::new(r"<(/)?([A-Za-z0-9_]+)(/)?>").unwrap();
}

/// Element name of the paired inline tag.
pub const PAIRED_TAG: &str = "g";

/// Element names of the standalone inline tags.
pub const STANDALONE_TAGS: [&str; 3] = ["x", "bx", "ex"];

/// Standalone element kind by inline id, so `<5/>` is written back as the
/// element it was read from.
pub type InlineKinds = HashMap<String, String>;

/// How [`from_markers`] treats a closing marker that does not match the
/// innermost open one, and open markers left unclosed at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Ignore the stray closing marker and close anything left open at the end.
    #[default]
    Tolerant,
    /// Reject the input with [`Error::MalformedMarkers`].
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerToken {
    Open(String),
    Close(String),
    Standalone(String),
    Text(String),
}

/// Renders mixed content as a marker string.
///
/// Elements other than the inline tags (comment or location `mrk`s, for
/// instance) are transparent: their content is kept, the tag is not.
pub fn to_markers(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_markers(nodes, &mut out);
    out
}

fn write_markers(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => match inline_id(element) {
                Some(id) if element.name == PAIRED_TAG => {
                    out.push('<');
                    out.push_str(id);
                    out.push('>');
                    write_markers(&element.children, out);
                    out.push_str("</");
                    out.push_str(id);
                    out.push('>');
                }
                Some(id) if is_standalone(&element.name) => {
                    out.push('<');
                    out.push_str(id);
                    out.push_str("/>");
                }
                _ => write_markers(&element.children, out),
            },
        }
    }
}

fn inline_id(element: &Element) -> Option<&str> {
    element.attribute("id").filter(|id| !id.is_empty())
}

fn is_standalone(name: &str) -> bool {
    STANDALONE_TAGS.contains(&name)
}

/// Splits a marker string into tokens. A `<` that does not start a marker
/// is ordinary text.
pub fn tokenize(input: &str) -> Vec<MarkerToken> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in MARKER_REGEX.captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let closing = caps.get(1).is_some();
        let self_closing = caps.get(3).is_some();
        if closing && self_closing {
            // `</id/>` is not a marker
            continue;
        }
        if whole.start() > last {
            tokens.push(MarkerToken::Text(input[last..whole.start()].to_string()));
        }
        let id = caps[2].to_string();
        tokens.push(match (closing, self_closing) {
            (true, _) => MarkerToken::Close(id),
            (_, true) => MarkerToken::Standalone(id),
            _ => MarkerToken::Open(id),
        });
        last = whole.end();
    }
    if last < input.len() {
        tokens.push(MarkerToken::Text(input[last..].to_string()));
    }

    merge_adjacent_text(tokens)
}

fn merge_adjacent_text(tokens: Vec<MarkerToken>) -> Vec<MarkerToken> {
    let mut merged: Vec<MarkerToken> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match (merged.last_mut(), token) {
            (Some(MarkerToken::Text(prev)), MarkerToken::Text(text)) => prev.push_str(&text),
            (_, token) => merged.push(token),
        }
    }
    merged
}

/// Builds inline content back from a marker string.
pub fn from_markers(input: &str, policy: MismatchPolicy) -> Result<Vec<Node>, Error> {
    let mut stack = vec![Element::new("target")];

    for token in tokenize(input) {
        match token {
            MarkerToken::Open(id) => {
                stack.push(Element::new(PAIRED_TAG).with_attribute("id", id));
            }
            MarkerToken::Close(id) => {
                let matches_top = stack.len() > 1
                    && stack.last().and_then(|top| top.attribute("id")) == Some(id.as_str());
                if matches_top {
                    close_top(&mut stack);
                } else if policy == MismatchPolicy::Strict {
                    return Err(Error::MalformedMarkers(format!(
                        "closing marker </{id}> does not match an open marker"
                    )));
                }
            }
            MarkerToken::Standalone(id) => {
                if let Some(top) = stack.last_mut() {
                    top.push_element(Element::new("x").with_attribute("id", id));
                }
            }
            MarkerToken::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.push_text(&text);
                }
            }
        }
    }

    if stack.len() > 1 && policy == MismatchPolicy::Strict {
        let unclosed = stack[1..]
            .iter()
            .filter_map(|e| e.attribute("id"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::MalformedMarkers(format!(
            "markers left open: {unclosed}"
        )));
    }
    while stack.len() > 1 {
        close_top(&mut stack);
    }

    Ok(stack.pop().map(|root| root.children).unwrap_or_default())
}

fn close_top(stack: &mut Vec<Element>) {
    if let Some(done) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.push_element(done);
        }
    }
}

/// Serializes inline content as XLIFF markup.
pub fn to_xml(nodes: &[Node], kinds: &InlineKinds) -> String {
    let mut out = String::new();
    write_xml(nodes, kinds, &mut out);
    out
}

fn write_xml(nodes: &[Node], kinds: &InlineKinds, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&partial_escape(text.as_str())),
            Node::Element(element) => {
                let id = escape(element.attribute("id").unwrap_or_default());
                if element.name == PAIRED_TAG {
                    out.push_str(&format!("<{PAIRED_TAG} id=\"{id}\">"));
                    write_xml(&element.children, kinds, out);
                    out.push_str(&format!("</{PAIRED_TAG}>"));
                } else {
                    let kind = element
                        .attribute("id")
                        .and_then(|id| kinds.get(id))
                        .map_or(element.name.as_str(), String::as_str);
                    out.push_str(&format!("<{kind} id=\"{id}\"/>"));
                }
            }
        }
    }
}

/// Records the element kind of every standalone inline tag under `nodes`.
pub fn collect_inline_kinds(nodes: &[Node], kinds: &mut InlineKinds) {
    for node in nodes {
        if let Node::Element(element) = node {
            if is_standalone(&element.name) {
                if let Some(id) = inline_id(element) {
                    kinds.insert(id.to_string(), element.name.clone());
                }
            }
            collect_inline_kinds(&element.children, kinds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn content(xml: &str) -> Vec<Node> {
        parse_document(&format!("<target>{xml}</target>"))
            .unwrap()
            .children
    }

    #[test]
    fn test_forward_nested_and_tails() {
        let nodes = content(r#"A <g id="1">b <g id="2">c</g> d</g> e<x id="3"/>f<bx id="4"/>"#);
        assert_eq!(to_markers(&nodes), "A <1>b <2>c</2> d</1> e<3/>f<4/>");
    }

    #[test]
    fn test_forward_transparent_elements() {
        let nodes = content(r#"a<mrk mtype="x-sdl-comment">b<x id="7"/></mrk>c"#);
        assert_eq!(to_markers(&nodes), "ab<7/>c");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Hi <10>there</10> <5/> 3 < 4"),
            vec![
                MarkerToken::Text("Hi ".to_string()),
                MarkerToken::Open("10".to_string()),
                MarkerToken::Text("there".to_string()),
                MarkerToken::Close("10".to_string()),
                MarkerToken::Text(" ".to_string()),
                MarkerToken::Standalone("5".to_string()),
                MarkerToken::Text(" 3 < 4".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_rejects_close_and_self_close() {
        assert_eq!(
            tokenize("a</1/>b"),
            vec![MarkerToken::Text("a</1/>b".to_string())]
        );
    }

    #[test]
    fn test_reverse_to_xml() {
        let nodes = from_markers("Hallo <10>wereld</10> & <5/>", MismatchPolicy::Strict).unwrap();
        let mut kinds = InlineKinds::new();
        kinds.insert("5".to_string(), "bx".to_string());
        assert_eq!(
            to_xml(&nodes, &kinds),
            r#"Hallo <g id="10">wereld</g> &amp; <bx id="5"/>"#
        );
    }

    #[test]
    fn test_standalone_defaults_to_x() {
        let nodes = from_markers("<7/>", MismatchPolicy::Tolerant).unwrap();
        assert_eq!(to_xml(&nodes, &InlineKinds::new()), r#"<x id="7"/>"#);
    }

    #[test]
    fn test_tolerant_mismatched_close_is_ignored() {
        let nodes = from_markers("<1>a</2>b</1>", MismatchPolicy::Tolerant).unwrap();
        assert_eq!(to_markers(&nodes), "<1>ab</1>");
    }

    #[test]
    fn test_tolerant_closes_unclosed() {
        let nodes = from_markers("<1>a<2>b", MismatchPolicy::Tolerant).unwrap();
        assert_eq!(to_markers(&nodes), "<1>a<2>b</2></1>");
    }

    #[test]
    fn test_strict_rejects_mismatch() {
        assert!(matches!(
            from_markers("<1>a</2>", MismatchPolicy::Strict),
            Err(Error::MalformedMarkers(_))
        ));
        assert!(matches!(
            from_markers("a</2>", MismatchPolicy::Strict),
            Err(Error::MalformedMarkers(_))
        ));
        assert!(matches!(
            from_markers("<1>a", MismatchPolicy::Strict),
            Err(Error::MalformedMarkers(_))
        ));
    }

    #[test]
    fn test_collect_inline_kinds() {
        let nodes = content(r#"<g id="1"><bx id="2"/>a<ex id="3"/></g><x id="4"/>"#);
        let mut kinds = InlineKinds::new();
        collect_inline_kinds(&nodes, &mut kinds);
        assert_eq!(kinds.len(), 3);
        assert_eq!(kinds["2"], "bx");
        assert_eq!(kinds["3"], "ex");
        assert_eq!(kinds["4"], "x");
    }
}
