//! Core types shared by the parser, the writer and the host-facing
//! [`crate::Codec`].

use std::{fmt::Display, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    markers::InlineKinds,
    status::{Origin, SegmentMetadata, TextMatch},
};

/// Workflow status of a segment, as the host editor sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// No target text yet, or the vendor status is unspecified.
    #[default]
    NotTranslated,

    /// Target text exists but is not confirmed.
    Draft,

    /// Confirmed by the translator.
    Translated,

    /// Confirmed by a reviewer.
    Approved,

    /// Sent back by a reviewer.
    Rejected,
}

impl SegmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::NotTranslated => "not_translated",
            SegmentStatus::Draft => "draft",
            SegmentStatus::Translated => "translated",
            SegmentStatus::Approved => "approved",
            SegmentStatus::Rejected => "rejected",
        }
    }

    /// True for the statuses written back as a vendor confirmation.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SegmentStatus::Translated | SegmentStatus::Approved)
    }
}

impl FromStr for SegmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_translated" => Ok(SegmentStatus::NotTranslated),
            "draft" => Ok(SegmentStatus::Draft),
            // hosts call a translator confirmation "confirmed"
            "translated" | "confirmed" => Ok(SegmentStatus::Translated),
            "approved" => Ok(SegmentStatus::Approved),
            "rejected" => Ok(SegmentStatus::Rejected),
            _ => Err(format!("Unknown segment status: {}", s)),
        }
    }
}

impl Display for SegmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One translatable unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Segment {
    /// `{unit_id}_{sub_id}` for segmented units, the unit id otherwise.
    pub segment_id: String,

    /// Id of the containing `trans-unit`.
    pub unit_id: String,

    /// `mid` of the segment marker, for segmented units.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub sub_id: Option<String>,

    /// Marker-encoded source text.
    pub source_text: String,

    /// Marker-encoded target text; the host edits this.
    pub target_text: String,

    pub status: SegmentStatus,

    /// Match quality from translation memory, 0..=100. A hint only.
    pub match_percent: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub origin: Option<Origin>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub text_match: Option<TextMatch>,

    /// Carried for the host; this crate does not enforce it.
    pub locked: bool,

    pub source_file_path: PathBuf,

    /// Target text and status as parsed, used to find modified segments.
    #[serde(skip)]
    pub(crate) pristine: (String, SegmentStatus),
}

impl Segment {
    pub(crate) fn new(
        unit_id: &str,
        sub_id: Option<&str>,
        source_text: String,
        target_text: String,
        metadata: &SegmentMetadata,
        source_file_path: PathBuf,
    ) -> Self {
        let segment_id = match sub_id {
            Some(sub_id) => format!("{unit_id}_{sub_id}"),
            None => unit_id.to_string(),
        };
        let status = metadata.status();
        Segment {
            segment_id,
            unit_id: unit_id.to_string(),
            sub_id: sub_id.map(str::to_string),
            source_text,
            pristine: (target_text.clone(), status),
            target_text,
            status,
            match_percent: metadata.percent,
            origin: metadata.origin.clone(),
            text_match: metadata.text_match,
            locked: metadata.locked,
            source_file_path,
        }
    }

    /// True if the host changed the target text or the status since load.
    pub fn is_modified(&self) -> bool {
        self.target_text != self.pristine.0 || self.status != self.pristine.1
    }

    /// Applies an update from the host.
    pub fn apply(&mut self, update: &SegmentUpdate) {
        self.target_text.clone_from(&update.target_text);
        self.status = update.status;
    }

    /// Marks the current state as saved.
    pub(crate) fn mark_saved(&mut self) {
        self.pristine = (self.target_text.clone(), self.status);
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Segment {{ id: {}, source: {}, target: {}, status: {} }}",
            self.segment_id, self.source_text, self.target_text, self.status
        )
    }
}

/// New target text and status for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SegmentUpdate {
    pub target_text: String,
    pub status: SegmentStatus,
}

impl SegmentUpdate {
    pub fn new(target_text: impl Into<String>, status: SegmentStatus) -> Self {
        SegmentUpdate {
            target_text: target_text.into(),
            status,
        }
    }
}

/// One parsed bilingual interchange file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BilingualFile {
    pub path: PathBuf,
    pub source_language: String,
    pub target_language: String,
    pub segments: Vec<Segment>,

    /// Standalone inline tag kinds by id, used when writing markers back.
    #[serde(skip)]
    pub(crate) inline_kinds: InlineKinds,
}

impl BilingualFile {
    pub fn find_segment(&self, segment_id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.segment_id == segment_id)
    }

    pub fn find_segment_mut(&mut self, segment_id: &str) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.segment_id == segment_id)
    }

    /// A file that parsed but produced no segments.
    pub fn is_suspect(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn has_modifications(&self) -> bool {
        self.segments.iter().any(Segment::is_modified)
    }
}
