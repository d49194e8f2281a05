//! Byte-preserving write-back of translated segments.
//!
//! The original file is never re-serialized. Its decoded text is scanned
//! once to find where each unit's target content and confirmation records
//! live, an [`EditList`] is computed for the modified segments only, and the
//! edits are applied in a single pass. A file whose segments are all
//! unmodified comes out byte-identical, BOM included.

use std::{
    collections::HashMap,
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use crate::{
    encoding,
    error::Error,
    markers::{InlineKinds, MismatchPolicy, from_markers, to_xml},
    patch::{EditList, rewrite_start_tag},
    status::record_rewrite,
    types::{BilingualFile, Segment},
};

/// Where an element's content can be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ContentSpan {
    /// `<e …>inner</e>`: the inner range.
    Open(Range<usize>),
    /// `<e …/>`: the whole tag.
    Empty(Range<usize>),
}

/// Byte spans of one `trans-unit` in the raw text.
#[derive(Debug, Clone, Default)]
struct UnitSpans {
    id: String,
    /// Just after `</source>` or `</seg-source>`, where a missing target goes.
    target_insert_at: Option<usize>,
    target: Option<ContentSpan>,
    /// Target segment markers in document order.
    markers: Vec<TargetMarker>,
    /// Confirmation record start tags by `id`.
    records: Vec<(String, Range<usize>)>,
}

/// A `<mrk mtype="seg">` inside `<target>`.
#[derive(Debug, Clone)]
struct TargetMarker {
    mid: String,
    /// Offset of the marker's `<`.
    start: usize,
    content: ContentSpan,
}

struct Frame {
    name: Vec<u8>,
    /// `mid`, tag start and inner start of a target segment marker.
    marker: Option<(String, usize, usize)>,
}

fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>, Error> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Records the byte spans of every unit, in document order.
fn scan_units(text: &str) -> Result<Vec<UnitSpans>, Error> {
    let mut reader = Reader::from_str(text);
    let mut units = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut unit: Option<(usize, UnitSpans)> = None;
    let mut target_inner_start = None;

    loop {
        let event = reader.read_event()?;
        let end = reader.buffer_position() as usize;
        // '<' cannot appear unescaped in attribute values, so the last one
        // before the reader position opens the tag just read
        let tag_start = || text[..end].rfind('<').unwrap_or(end);

        match event {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                let depth = stack.len();
                let mut marker = None;
                if let Some((unit_depth, spans)) = unit.as_mut() {
                    match name.as_slice() {
                        b"target" if depth == *unit_depth + 1 => {
                            target_inner_start = Some(end);
                        }
                        b"mrk" if target_inner_start.is_some() => {
                            if attribute(&e, b"mtype")?.as_deref() == Some("seg") {
                                let mid = attribute(&e, b"mid")?.unwrap_or_default();
                                marker = Some((mid, tag_start(), end));
                            }
                        }
                        b"seg" if in_seg_defs(&stack) => {
                            let id = attribute(&e, b"id")?.unwrap_or_default();
                            spans.records.push((id, tag_start()..end));
                        }
                        _ => {}
                    }
                } else if name == b"trans-unit" {
                    let id = attribute(&e, b"id")?.unwrap_or_default();
                    let spans = UnitSpans {
                        id,
                        ..Default::default()
                    };
                    unit = Some((depth, spans));
                }
                stack.push(Frame { name, marker });
            }
            Event::Empty(e) => {
                let depth = stack.len();
                let Some((unit_depth, spans)) = unit.as_mut() else {
                    continue;
                };
                match e.local_name().as_ref() {
                    b"target" if depth == *unit_depth + 1 => {
                        spans.target = Some(ContentSpan::Empty(tag_start()..end));
                    }
                    b"mrk" if target_inner_start.is_some() => {
                        if attribute(&e, b"mtype")?.as_deref() == Some("seg") {
                            let mid = attribute(&e, b"mid")?.unwrap_or_default();
                            let start = tag_start();
                            spans.markers.push(TargetMarker {
                                mid,
                                start,
                                content: ContentSpan::Empty(start..end),
                            });
                        }
                    }
                    b"seg" if in_seg_defs(&stack) => {
                        let id = attribute(&e, b"id")?.unwrap_or_default();
                        spans.records.push((id, tag_start()..end));
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                let Some(frame) = stack.pop() else {
                    continue;
                };
                let depth = stack.len();
                if frame.name == b"trans-unit" && unit.as_ref().is_some_and(|(d, _)| *d == depth) {
                    units.extend(unit.take().map(|(_, spans)| spans));
                    continue;
                }
                let Some((unit_depth, spans)) = unit.as_mut() else {
                    continue;
                };
                let direct_child = depth == *unit_depth + 1;
                match frame.name.as_slice() {
                    b"target" if direct_child => {
                        if let Some(start) = target_inner_start.take() {
                            spans.target = Some(ContentSpan::Open(start..tag_start()));
                        }
                    }
                    b"source" | b"seg-source" if direct_child => {
                        spans.target_insert_at = Some(end);
                    }
                    _ => {
                        if let Some((mid, start, inner_start)) = frame.marker {
                            spans.markers.push(TargetMarker {
                                mid,
                                start,
                                content: ContentSpan::Open(inner_start..tag_start()),
                            });
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(units)
}

fn in_seg_defs(stack: &[Frame]) -> bool {
    stack.last().is_some_and(|f| f.name == b"seg-defs")
}

/// Computes the edits that write `file`'s modified segments into `text`.
pub fn plan_edits(
    text: &str,
    file: &BilingualFile,
    policy: MismatchPolicy,
) -> Result<EditList, Error> {
    let mut edits = EditList::new();

    let mut groups: Vec<(&str, Vec<&Segment>)> = Vec::new();
    for segment in file.segments.iter().filter(|s| s.is_modified()) {
        match groups.iter_mut().find(|(id, _)| *id == segment.unit_id) {
            Some((_, group)) => group.push(segment),
            None => groups.push((&segment.unit_id, vec![segment])),
        }
    }
    if groups.is_empty() {
        return Ok(edits);
    }

    let units = scan_units(text)?;
    let by_id: HashMap<&str, &UnitSpans> = units.iter().map(|u| (u.id.as_str(), u)).collect();

    for (unit_id, segments) in groups {
        let Some(&spans) = by_id.get(unit_id) else {
            warn!(
                "{}: trans-unit {} not found, changes not written",
                file.path.display(),
                unit_id
            );
            continue;
        };
        let unit = UnitEdit {
            text,
            spans,
            order: segment_order(file, unit_id),
        };
        unit.plan_target_edits(&mut edits, &segments, &file.inline_kinds, policy)?;
        plan_record_edits(&mut edits, text, spans, &segments);
    }

    Ok(edits)
}

/// Every segment `mid` of a unit, modified or not, in seg-source order.
fn segment_order<'a>(file: &'a BilingualFile, unit_id: &str) -> Vec<&'a str> {
    file.segments
        .iter()
        .filter(|s| s.unit_id == unit_id)
        .filter_map(|s| s.sub_id.as_deref())
        .collect()
}

/// Expands `<name …/>` into `<name …>content</name>`, keeping the tag's
/// name and attributes as written.
fn expand_empty_tag(tag: &str, content: &str) -> String {
    let head = tag.strip_suffix("/>").map_or(tag, str::trim_end);
    let name = head
        .get(1..)
        .and_then(|rest| rest.split(char::is_whitespace).next())
        .unwrap_or_default();
    format!("{head}>{content}</{name}>")
}

struct UnitEdit<'a> {
    text: &'a str,
    spans: &'a UnitSpans,
    /// Segment `mid`s of the unit in seg-source order.
    order: Vec<&'a str>,
}

impl UnitEdit<'_> {
    /// Index of the first existing target marker whose segment comes after
    /// `mid` in seg-source order.
    fn next_marker(&self, mid: &str) -> Option<usize> {
        let position = self.order.iter().position(|m| *m == mid)?;
        self.order[position + 1..]
            .iter()
            .find_map(|later| self.spans.markers.iter().position(|m| m.mid == *later))
    }

    fn expand(&self, tag: &Range<usize>, content: &str) -> String {
        expand_empty_tag(&self.text[tag.clone()], content)
    }

    fn plan_target_edits(
        &self,
        edits: &mut EditList,
        segments: &[&Segment],
        kinds: &InlineKinds,
        policy: MismatchPolicy,
    ) -> Result<(), Error> {
        let spans = self.spans;
        // new markers to place before an existing marker, by marker index
        let mut before: Vec<(usize, String)> = Vec::new();
        let mut replaced: Vec<(usize, String)> = Vec::new();
        let mut tail = String::new();

        for segment in segments.iter().filter(|s| !s.target_text.is_empty()) {
            let content = to_xml(&from_markers(&segment.target_text, policy)?, kinds);
            let Some(mid) = &segment.sub_id else {
                match &spans.target {
                    Some(ContentSpan::Open(inner)) => edits.replace(inner.clone(), content),
                    Some(ContentSpan::Empty(tag)) => {
                        edits.replace(tag.clone(), self.expand(tag, &content))
                    }
                    None => tail.push_str(&content),
                }
                continue;
            };
            match spans.markers.iter().position(|m| m.mid == *mid) {
                Some(index) => match &spans.markers[index].content {
                    ContentSpan::Open(inner) => edits.replace(inner.clone(), content),
                    ContentSpan::Empty(tag) => {
                        replaced.push((index, self.expand(tag, &content)))
                    }
                },
                None => {
                    let marker = format!(r#"<mrk mtype="seg" mid="{mid}">{content}</mrk>"#);
                    match self.next_marker(mid) {
                        Some(index) => match before.iter_mut().find(|(i, _)| *i == index) {
                            Some((_, pending)) => pending.push_str(&marker),
                            None => before.push((index, marker)),
                        },
                        None => tail.push_str(&marker),
                    }
                }
            }
        }

        // an insertion and a replacement may not share a start offset, so a
        // new marker in front of a replaced empty marker joins its edit
        for (index, replacement) in replaced {
            let marker = &spans.markers[index];
            let prefix = match before.iter().position(|(i, _)| *i == index) {
                Some(at) => before.remove(at).1,
                None => String::new(),
            };
            if let ContentSpan::Empty(tag) = &marker.content {
                edits.replace(tag.clone(), prefix + &replacement);
            }
        }
        for (index, pending) in before {
            edits.insert(spans.markers[index].start, pending);
        }

        if tail.is_empty() {
            return Ok(());
        }
        match (&spans.target, spans.target_insert_at) {
            (Some(ContentSpan::Open(inner)), _) => edits.insert(inner.end, tail),
            (Some(ContentSpan::Empty(tag)), _) => {
                edits.replace(tag.clone(), self.expand(tag, &tail))
            }
            (None, Some(at)) => edits.insert(at, format!("<target>{tail}</target>")),
            (None, None) => warn!(
                "trans-unit {} has no source to anchor a new target, changes not written",
                spans.id
            ),
        }
        Ok(())
    }
}

fn plan_record_edits(edits: &mut EditList, text: &str, spans: &UnitSpans, segments: &[&Segment]) {
    for segment in segments.iter().filter(|s| !s.target_text.is_empty()) {
        let Some(rewrite) = record_rewrite(segment.status) else {
            continue;
        };
        let record = match &segment.sub_id {
            Some(mid) => spans.records.iter().find(|(id, _)| id == mid),
            None => spans.records.first(),
        };
        match record {
            Some((_, range)) => edits.replace(
                range.clone(),
                rewrite_start_tag(&text[range.clone()], &rewrite.set, &rewrite.remove),
            ),
            None => debug!(
                "segment {} has no confirmation record, status not written",
                segment.segment_id
            ),
        }
    }
}

/// Patches the original bytes of `file` with its modified segments.
pub fn patch_bytes(
    original: &[u8],
    file: &BilingualFile,
    policy: MismatchPolicy,
) -> Result<Vec<u8>, Error> {
    let decoded = encoding::decode(original)?;
    let edits = plan_edits(&decoded.text, file, policy)?;
    if edits.is_empty() {
        return Ok(original.to_vec());
    }
    debug!("{}: applying {} edits", file.path.display(), edits.len());
    let patched = edits.apply(&decoded.text)?;
    Ok(decoded.encode(&patched))
}

/// Patches `file` in place at its own path.
///
/// Returns whether anything was written.
pub fn write_file(file: &BilingualFile, policy: MismatchPolicy) -> Result<bool, Error> {
    let original = fs::read(&file.path)?;
    let patched = patch_bytes(&original, file, policy)?;
    if patched == original {
        return Ok(false);
    }
    fs::write(&file.path, patched)?;
    Ok(true)
}

/// Outcome of saving a batch of files.
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Files that were rewritten.
    pub written: Vec<PathBuf>,
    /// Files that were left untouched because nothing changed.
    pub unchanged: Vec<PathBuf>,
    /// One [`Error::PartialWriteFailure`] per file that failed.
    pub failures: Vec<Error>,
}

impl SaveReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_paths(&self) -> Vec<&Path> {
        self.failures
            .iter()
            .filter_map(|e| match e {
                Error::PartialWriteFailure { path, .. } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }
}

/// Saves every file; a failing file is logged and recorded, and the rest
/// are still saved.
pub fn write_files<'a>(
    files: impl IntoIterator<Item = &'a mut BilingualFile>,
    policy: MismatchPolicy,
) -> SaveReport {
    let mut report = SaveReport::default();
    for file in files {
        match write_file(file, policy) {
            Ok(written) => {
                file.segments.iter_mut().for_each(Segment::mark_saved);
                if written {
                    report.written.push(file.path.clone());
                } else {
                    report.unchanged.push(file.path.clone());
                }
            }
            Err(error) => {
                warn!("failed to save {}: {}", file.path.display(), error);
                report
                    .failures
                    .push(Error::partial_write(file.path.clone(), error));
            }
        }
    }
    report
}
