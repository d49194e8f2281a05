//! Byte-preserving text edits.
//!
//! Write-back never re-serializes a document. Every change is an [`Edit`]
//! of a byte range in the decoded text; all edits for a file are collected
//! first and applied in one sorted pass, so anything outside an edit's range
//! is copied through untouched.

use std::ops::Range;

use lazy_static::lazy_static;
use quick_xml::escape::escape;
use regex::Regex;

use crate::error::Error;

lazy_static! {
    static ref ATTRIBUTE_REGEX: Regex =
        Regex::new(r#"(\s+)([A-Za-z_:][-A-Za-z0-9_:.]*)(\s*=\s*)("[^"]*"|'[^']*')"#).unwrap();
}

/// Replace `range` of the original text with `replacement`. An empty range
/// is an insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

/// A set of non-overlapping edits against one text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditList {
    edits: Vec<Edit>,
}

impl EditList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, range: Range<usize>, replacement: impl Into<String>) {
        self.edits.push(Edit {
            range,
            replacement: replacement.into(),
        });
    }

    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.replace(at..at, text);
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Applies all edits in one pass.
    ///
    /// Fails with [`Error::OverlappingEdits`] if two edits overlap, share a
    /// start position, or a range falls outside `text` or inside a character.
    pub fn apply(mut self, text: &str) -> Result<String, Error> {
        self.edits
            .sort_by_key(|edit| (edit.range.start, edit.range.end));

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut previous_start = None;

        for edit in &self.edits {
            let Range { start, end } = edit.range;
            let in_bounds = start <= end
                && end <= text.len()
                && text.is_char_boundary(start)
                && text.is_char_boundary(end);
            if !in_bounds || start < cursor || previous_start == Some(start) {
                return Err(Error::OverlappingEdits(start));
            }
            out.push_str(&text[cursor..start]);
            out.push_str(&edit.replacement);
            cursor = end;
            previous_start = Some(start);
        }
        out.push_str(&text[cursor..]);

        Ok(out)
    }
}

/// Rewrites the attributes of one start tag (`<name …>` or `<name …/>`).
///
/// Attributes named in `set` get the new value with their original quote
/// character; missing ones are appended after the last attribute. Attributes
/// named in `remove` are dropped together with their leading whitespace.
/// Everything else, including attribute order and spacing, is kept.
pub fn rewrite_start_tag(tag: &str, set: &[(&str, String)], remove: &[&str]) -> String {
    let name_end = tag
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_whitespace() || *c == '/' || *c == '>')
        .map_or(tag.len(), |(i, _)| i);

    let mut out = String::with_capacity(tag.len() + 32);
    out.push_str(&tag[..name_end]);

    let mut cursor = name_end;
    let mut seen = Vec::new();
    for caps in ATTRIBUTE_REGEX.captures_iter(&tag[name_end..]) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let (start, end) = (name_end + whole.start(), name_end + whole.end());
        out.push_str(&tag[cursor..start]);
        cursor = end;

        let key = &caps[2];
        if remove.contains(&key) {
            continue;
        }
        match set.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => {
                let quote = &caps[4][..1];
                out.push_str(&caps[1]);
                out.push_str(key);
                out.push_str(&caps[3]);
                out.push_str(quote);
                out.push_str(&escape(value.as_str()));
                out.push_str(quote);
                seen.push(key.to_string());
            }
            None => out.push_str(whole.as_str()),
        }
    }

    for (name, value) in set {
        if !seen.iter().any(|s| s == name) {
            out.push_str(&format!(" {}=\"{}\"", name, escape(value.as_str())));
        }
    }
    out.push_str(&tag[cursor..]);
    out
}

/// All attributes of a raw start tag as `(name, value)`, without unescaping.
pub fn start_tag_attributes(tag: &str) -> Vec<(&str, &str)> {
    ATTRIBUTE_REGEX
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(2)?.as_str();
            let value = caps.get(4)?.as_str();
            Some((name, &value[1..value.len() - 1]))
        })
        .collect()
}

/// Reads one attribute value from a raw start tag, without unescaping.
pub fn start_tag_attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    start_tag_attributes(tag)
        .into_iter()
        .find_map(|(key, value)| (key == name).then_some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_in_one_pass() {
        let mut edits = EditList::new();
        edits.replace(6..11, "there");
        edits.insert(0, ">> ");
        edits.replace(11..12, "?");
        assert_eq!(edits.apply("Hello world!").unwrap(), ">> Hello there?");
    }

    #[test]
    fn test_empty_list_is_identity() {
        let text = "<a x='1'>  b </a>\r\n";
        assert_eq!(EditList::new().apply(text).unwrap(), text);
    }

    #[test]
    fn test_overlap_is_rejected() {
        let mut edits = EditList::new();
        edits.replace(0..5, "a");
        edits.replace(3..7, "b");
        assert!(matches!(
            edits.apply("0123456789"),
            Err(Error::OverlappingEdits(3))
        ));

        let mut edits = EditList::new();
        edits.insert(2, "a");
        edits.insert(2, "b");
        assert!(edits.apply("0123").is_err());

        let mut edits = EditList::new();
        edits.replace(2..20, "x");
        assert!(edits.apply("0123").is_err());
    }

    #[test]
    fn test_rewrite_start_tag_preserves_untouched_attributes() {
        let tag = r#"<sdl:seg id="1" conf='Draft'  origin="tm" origin-system="Main TM" percent="100" locked="false">"#;
        let rewritten = rewrite_start_tag(
            tag,
            &[
                ("conf", "Translated".to_string()),
                ("origin", "interactive".to_string()),
            ],
            &["origin-system", "percent", "text-match"],
        );
        assert_eq!(
            rewritten,
            r#"<sdl:seg id="1" conf='Translated'  origin="interactive" locked="false">"#
        );
    }

    #[test]
    fn test_rewrite_start_tag_appends_missing() {
        let rewritten = rewrite_start_tag(
            r#"<sdl:seg id="2" />"#,
            &[("conf", "Translated".to_string())],
            &[],
        );
        assert_eq!(rewritten, r#"<sdl:seg id="2" conf="Translated" />"#);

        let rewritten = rewrite_start_tag("<ManualTask>", &[("Status", "Completed".to_string())], &[]);
        assert_eq!(rewritten, r#"<ManualTask Status="Completed">"#);
    }

    #[test]
    fn test_start_tag_attribute() {
        let tag = r#"<ManualTask Guid="g" Status='Assigned'>"#;
        assert_eq!(start_tag_attribute(tag, "Status"), Some("Assigned"));
        assert_eq!(start_tag_attribute(tag, "Missing"), None);
        assert_eq!(
            start_tag_attributes(tag),
            vec![("Guid", "g"), ("Status", "Assigned")]
        );
    }
}
