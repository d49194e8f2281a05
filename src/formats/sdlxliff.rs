//! Support for SDLXLIFF bilingual files.
//!
//! SDLXLIFF is XLIFF 1.2 with a vendor extension namespace. A translation
//! unit either holds a single source/target pair, or a `<seg-source>` split
//! into `<mrk mtype="seg" mid="…">` sub-segments with a parallel structure
//! in `<target>`. Confirmation status lives in `<sdl:seg-defs>`, one
//! `<sdl:seg id="…">` record per sub-segment.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use log::{debug, warn};

use crate::{
    encoding,
    error::Error,
    markers::{InlineKinds, collect_inline_kinds, to_markers},
    status::SegmentMetadata,
    traits::Parser,
    types::{BilingualFile, Segment},
    xml::{self, Element},
};

/// The XLIFF 1.2 namespace.
pub const XLIFF_NAMESPACE: &str = "urn:oasis:names:tc:xliff:document:1.2";

/// The vendor extension namespace.
pub const SDL_NAMESPACE: &str = "http://sdl.com/FileTypes/SdlXliff/1.0";

/// File extension of bilingual files inside a package.
pub const EXTENSION: &str = "sdlxliff";

/// Parser for one SDLXLIFF document.
///
/// Namespaces are configured per instance; the defaults match what the
/// reference tool writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XliffParser {
    pub base_namespace: String,
    pub vendor_namespace: String,
}

impl Default for XliffParser {
    fn default() -> Self {
        XliffParser {
            base_namespace: XLIFF_NAMESPACE.to_string(),
            vendor_namespace: SDL_NAMESPACE.to_string(),
        }
    }
}

impl XliffParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespaces(base: impl Into<String>, vendor: impl Into<String>) -> Self {
        XliffParser {
            base_namespace: base.into(),
            vendor_namespace: vendor.into(),
        }
    }

    /// Parses a whole file.
    ///
    /// Fails only when the document cannot be read at all, or lacks its
    /// `<xliff>`/`<file>`/`<body>` structure. A unit that cannot be read is
    /// skipped with a warning.
    pub fn parse(&self, bytes: &[u8], path: &Path) -> Result<BilingualFile, Error> {
        let decoded = encoding::decode(bytes)?;
        let root = xml::parse_document(&decoded.text)?;
        let base = self.base_namespace.as_str();

        if !root.is(base, "xliff") {
            return Err(Error::missing_metadata(format!(
                "{}: root element is not <xliff>",
                path.display()
            )));
        }

        let files: Vec<&Element> = root
            .child_elements()
            .filter(|e| e.is(base, "file"))
            .collect();
        let Some(first) = files.first() else {
            return Err(Error::missing_metadata(format!(
                "{}: no <file> declaration",
                path.display()
            )));
        };

        let mut bilingual = BilingualFile {
            path: path.to_path_buf(),
            source_language: first
                .attribute("source-language")
                .unwrap_or_default()
                .to_string(),
            target_language: first
                .attribute("target-language")
                .unwrap_or_default()
                .to_string(),
            segments: Vec::new(),
            inline_kinds: InlineKinds::new(),
        };

        let mut bodies = 0;
        let mut seen = HashSet::new();
        for file in &files {
            let Some(body) = file.find_child(base, "body") else {
                warn!("{}: <file> without <body>, skipped", path.display());
                continue;
            };
            bodies += 1;

            let mut units = Vec::new();
            body.find_descendants(&|e: &Element| e.is(base, "trans-unit"), &mut units);
            for unit in units {
                match self.parse_unit(unit, path, &mut bilingual.inline_kinds) {
                    Ok(segments) => {
                        for segment in segments {
                            if seen.insert(segment.segment_id.clone()) {
                                bilingual.segments.push(segment);
                            } else {
                                warn!(
                                    "{}: duplicate segment id {}, skipped",
                                    path.display(),
                                    segment.segment_id
                                );
                            }
                        }
                    }
                    Err(reason) => warn!("{}: {}, unit skipped", path.display(), reason),
                }
            }
        }

        if bodies == 0 {
            return Err(Error::missing_metadata(format!(
                "{}: no <body> declaration",
                path.display()
            )));
        }
        if bilingual.is_suspect() {
            warn!("{}: no translatable segments found", path.display());
        } else {
            debug!(
                "{}: {} segments",
                path.display(),
                bilingual.segments.len()
            );
        }

        Ok(bilingual)
    }

    fn parse_unit(
        &self,
        unit: &Element,
        path: &Path,
        kinds: &mut InlineKinds,
    ) -> Result<Vec<Segment>, String> {
        if unit.attribute("translate") == Some("no") {
            return Ok(Vec::new());
        }
        let base = self.base_namespace.as_str();
        let unit_id = unit
            .attribute("id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "trans-unit without id".to_string())?;

        let records = self.confirmation_records(unit);
        let target = unit.find_child(base, "target");
        let source_markers = unit
            .find_child(base, "seg-source")
            .map(|seg_source| self.segment_markers(seg_source))
            .unwrap_or_default();

        if source_markers.is_empty() {
            let source = unit
                .find_child(base, "source")
                .ok_or_else(|| format!("trans-unit {unit_id} has no <source>"))?;
            collect_inline_kinds(&source.children, kinds);
            let target_text = target.map_or_else(String::new, |t| {
                collect_inline_kinds(&t.children, kinds);
                to_markers(&t.children)
            });
            let metadata = records
                .first()
                .map(|r| SegmentMetadata::from_record(r))
                .unwrap_or_default();
            return Ok(vec![Segment::new(
                unit_id,
                None,
                to_markers(&source.children),
                target_text,
                &metadata,
                path.to_path_buf(),
            )]);
        }

        let target_markers: HashMap<&str, &Element> = target
            .map(|t| self.segment_markers(t))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.attribute("mid").map(|mid| (mid, m)))
            .collect();

        let mut segments = Vec::with_capacity(source_markers.len());
        for marker in source_markers {
            let mid = marker
                .attribute("mid")
                .filter(|mid| !mid.is_empty())
                .ok_or_else(|| format!("segment marker without mid in trans-unit {unit_id}"))?;
            collect_inline_kinds(&marker.children, kinds);
            let target_text = target_markers.get(mid).map_or_else(String::new, |t| {
                collect_inline_kinds(&t.children, kinds);
                to_markers(&t.children)
            });
            let metadata = records
                .iter()
                .find(|r| r.attribute("id") == Some(mid))
                .map(|r| SegmentMetadata::from_record(r))
                .unwrap_or_default();
            segments.push(Segment::new(
                unit_id,
                Some(mid),
                to_markers(&marker.children),
                target_text,
                &metadata,
                path.to_path_buf(),
            ));
        }
        Ok(segments)
    }

    /// `<mrk mtype="seg">` elements anywhere below `element`.
    fn segment_markers<'a>(&self, element: &'a Element) -> Vec<&'a Element> {
        let base = self.base_namespace.as_str();
        let mut markers = Vec::new();
        element.find_descendants(
            &|e: &Element| e.is(base, "mrk") && e.attribute("mtype") == Some("seg"),
            &mut markers,
        );
        markers
    }

    /// Confirmation records (`<sdl:seg>`) of a unit, in document order.
    fn confirmation_records<'a>(&self, unit: &'a Element) -> Vec<&'a Element> {
        let vendor = self.vendor_namespace.as_str();
        unit.find_child(vendor, "seg-defs")
            .map(|defs| {
                defs.child_elements()
                    .filter(|e| e.is(vendor, "seg"))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Parser for BilingualFile {
    fn parse_bytes(bytes: &[u8], path: &Path) -> Result<Self, Error> {
        XliffParser::default().parse(bytes, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{Origin, TextMatch};
    use crate::types::SegmentStatus;
    use indoc::indoc;

    const DOC: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <xliff xmlns:sdl="http://sdl.com/FileTypes/SdlXliff/1.0" xmlns="urn:oasis:names:tc:xliff:document:1.2" version="1.2">
          <file original="manual.docx" source-language="en-US" target-language="nl-NL" datatype="x-sdlfilterframework2">
            <header/>
            <body>
              <trans-unit id="1" translate="no"><source>structure</source></trans-unit>
              <group>
                <trans-unit id="3">
                  <source>Hello <g id="10">world</g> Bye</source>
                  <seg-source><mrk mtype="seg" mid="1">Hello <g id="10">world</g></mrk> <mrk mtype="seg" mid="2">Bye<x id="11"/></mrk></seg-source>
                  <target><mrk mtype="seg" mid="2">Dag<x id="11"/></mrk></target>
                  <sdl:seg-defs>
                    <sdl:seg id="1" conf="Draft" origin="tm" percent="87" text-match="SourceAndTarget"/>
                    <sdl:seg id="2" conf="ApprovedSignOff" origin="interactive" locked="true"/>
                  </sdl:seg-defs>
                </trans-unit>
              </group>
              <trans-unit id="4">
                <source>Plain <bx id="20"/>unit<ex id="21"/></source>
                <target>Gewone <bx id="20"/>eenheid<ex id="21"/></target>
                <sdl:seg-defs><sdl:seg id="1" conf="Translated" origin="mt"/></sdl:seg-defs>
              </trans-unit>
              <trans-unit><source>no id</source></trans-unit>
            </body>
          </file>
        </xliff>
    "#};

    fn parse(doc: &str) -> Result<BilingualFile, Error> {
        XliffParser::new().parse(doc.as_bytes(), Path::new("nl-NL/manual.docx.sdlxliff"))
    }

    #[test]
    fn test_languages_and_segment_count() {
        let file = parse(DOC).unwrap();
        assert_eq!(file.source_language, "en-US");
        assert_eq!(file.target_language, "nl-NL");
        let ids: Vec<_> = file.segments.iter().map(|s| s.segment_id.as_str()).collect();
        assert_eq!(ids, vec!["3_1", "3_2", "4"]);
    }

    #[test]
    fn test_segmented_unit() {
        let file = parse(DOC).unwrap();
        let first = file.find_segment("3_1").unwrap();
        assert_eq!(first.unit_id, "3");
        assert_eq!(first.sub_id.as_deref(), Some("1"));
        assert_eq!(first.source_text, "Hello <10>world</10>");
        assert_eq!(first.target_text, "");
        assert_eq!(first.status, SegmentStatus::Draft);
        assert_eq!(first.match_percent, 87);
        assert_eq!(first.origin, Some(Origin::TranslationMemory));
        assert_eq!(first.text_match, Some(TextMatch::SourceAndTarget));
        assert!(!first.locked);

        let second = file.find_segment("3_2").unwrap();
        assert_eq!(second.source_text, "Bye<11/>");
        assert_eq!(second.target_text, "Dag<11/>");
        assert_eq!(second.status, SegmentStatus::Approved);
        assert!(second.locked);
    }

    #[test]
    fn test_unsegmented_unit_and_inline_kinds() {
        let file = parse(DOC).unwrap();
        let plain = file.find_segment("4").unwrap();
        assert_eq!(plain.sub_id, None);
        assert_eq!(plain.source_text, "Plain <20/>unit<21/>");
        assert_eq!(plain.target_text, "Gewone <20/>eenheid<21/>");
        assert_eq!(plain.status, SegmentStatus::Translated);
        assert_eq!(file.inline_kinds["20"], "bx");
        assert_eq!(file.inline_kinds["21"], "ex");
        assert_eq!(file.inline_kinds["11"], "x");
    }

    #[test]
    fn test_no_segments_is_suspect_not_error() {
        let doc = indoc! {r#"
            <xliff xmlns="urn:oasis:names:tc:xliff:document:1.2"><file source-language="en" target-language="de"><body/></file></xliff>
        "#};
        let file = parse(doc).unwrap();
        assert!(file.is_suspect());
    }

    #[test]
    fn test_missing_body_or_file() {
        let no_file = r#"<xliff xmlns="urn:oasis:names:tc:xliff:document:1.2"/>"#;
        assert!(matches!(parse(no_file), Err(Error::MissingMetadata(_))));

        let no_body = r#"<xliff xmlns="urn:oasis:names:tc:xliff:document:1.2"><file/></xliff>"#;
        assert!(matches!(parse(no_body), Err(Error::MissingMetadata(_))));

        let wrong_ns = r#"<xliff><file><body/></file></xliff>"#;
        assert!(matches!(parse(wrong_ns), Err(Error::MissingMetadata(_))));
    }

    #[test]
    fn test_custom_namespaces() {
        let doc = r#"<xliff xmlns="urn:custom"><file source-language="en" target-language="fr"><body><trans-unit id="1"><source>a</source></trans-unit></body></file></xliff>"#;
        let parser = XliffParser::with_namespaces("urn:custom", SDL_NAMESPACE);
        let file = parser.parse(doc.as_bytes(), Path::new("x.sdlxliff")).unwrap();
        assert_eq!(file.segments.len(), 1);
    }

    #[test]
    fn test_bom_prefixed_file() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(DOC.as_bytes());
        let file = BilingualFile::parse_bytes(&bytes, Path::new("bom.sdlxliff")).unwrap();
        assert_eq!(file.segments.len(), 3);
    }
}
