//! Vendor confirmation vocabulary and its mapping to [`SegmentStatus`].
//!
//! Each confirmation record (`<sdl:seg>`) carries a confirmation level,
//! provenance (`origin`, `origin-system`), match quality (`percent`,
//! `text-match`) and a `locked` flag. All of those are closed types here,
//! with explicit tables in both directions.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{types::SegmentStatus, xml::Element};

pub const CONF_ATTR: &str = "conf";
pub const ORIGIN_ATTR: &str = "origin";
pub const ORIGIN_SYSTEM_ATTR: &str = "origin-system";
pub const PERCENT_ATTR: &str = "percent";
pub const TEXT_MATCH_ATTR: &str = "text-match";
pub const LOCKED_ATTR: &str = "locked";

/// Attributes dropped when a human confirms a segment: they describe an
/// automated match that no longer applies.
pub const STALE_PROVENANCE_ATTRS: [&str; 3] = [ORIGIN_SYSTEM_ATTR, PERCENT_ATTR, TEXT_MATCH_ATTR];

/// Confirmation level of a segment, as written in the `conf` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ConfirmationLevel {
    Unspecified,
    Draft,
    Translated,
    RejectedTranslation,
    ApprovedTranslation,
    RejectedSignOff,
    ApprovedSignOff,
}

impl ConfirmationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationLevel::Unspecified => "Unspecified",
            ConfirmationLevel::Draft => "Draft",
            ConfirmationLevel::Translated => "Translated",
            ConfirmationLevel::RejectedTranslation => "RejectedTranslation",
            ConfirmationLevel::ApprovedTranslation => "ApprovedTranslation",
            ConfirmationLevel::RejectedSignOff => "RejectedSignOff",
            ConfirmationLevel::ApprovedSignOff => "ApprovedSignOff",
        }
    }
}

impl FromStr for ConfirmationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unspecified" => Ok(ConfirmationLevel::Unspecified),
            "Draft" => Ok(ConfirmationLevel::Draft),
            "Translated" => Ok(ConfirmationLevel::Translated),
            "RejectedTranslation" => Ok(ConfirmationLevel::RejectedTranslation),
            "ApprovedTranslation" => Ok(ConfirmationLevel::ApprovedTranslation),
            "RejectedSignOff" => Ok(ConfirmationLevel::RejectedSignOff),
            "ApprovedSignOff" => Ok(ConfirmationLevel::ApprovedSignOff),
            _ => Err(format!("Unknown confirmation level: {}", s)),
        }
    }
}

impl Display for ConfirmationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a segment's target text came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Interactive,
    TranslationMemory,
    MachineTranslation,
    NeuralMachineTranslation,
    AdaptiveMachineTranslation,
    AutoPropagated,
    Source,
    DocumentMatch,
    NotTranslated,
    /// A value this crate does not know, kept verbatim.
    Other(String),
}

impl Origin {
    pub fn as_str(&self) -> &str {
        match self {
            Origin::Interactive => "interactive",
            Origin::TranslationMemory => "tm",
            Origin::MachineTranslation => "mt",
            Origin::NeuralMachineTranslation => "nmt",
            Origin::AdaptiveMachineTranslation => "amt",
            Origin::AutoPropagated => "auto-propagated",
            Origin::Source => "source",
            Origin::DocumentMatch => "document-match",
            Origin::NotTranslated => "not-translated",
            Origin::Other(value) => value,
        }
    }

    /// Maps an `origin` attribute value; never fails.
    pub fn parse(value: &str) -> Self {
        match value {
            "interactive" => Origin::Interactive,
            "tm" => Origin::TranslationMemory,
            "mt" => Origin::MachineTranslation,
            "nmt" => Origin::NeuralMachineTranslation,
            "amt" | "adaptive-mt" => Origin::AdaptiveMachineTranslation,
            "auto-propagated" => Origin::AutoPropagated,
            "source" => Origin::Source,
            "document-match" => Origin::DocumentMatch,
            "not-translated" => Origin::NotTranslated,
            other => Origin::Other(other.to_string()),
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of context match reported alongside a 100% match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum TextMatch {
    SourceAndTarget,
    Source,
}

impl FromStr for TextMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SourceAndTarget" => Ok(TextMatch::SourceAndTarget),
            "Source" => Ok(TextMatch::Source),
            _ => Err(format!("Unknown text match: {}", s)),
        }
    }
}

/// Read direction: vendor confirmation level to internal status.
pub fn status_from_confirmation(conf: Option<ConfirmationLevel>) -> SegmentStatus {
    match conf {
        Some(ConfirmationLevel::Draft) => SegmentStatus::Draft,
        Some(ConfirmationLevel::Translated) => SegmentStatus::Translated,
        Some(ConfirmationLevel::ApprovedTranslation | ConfirmationLevel::ApprovedSignOff) => {
            SegmentStatus::Approved
        }
        Some(ConfirmationLevel::RejectedTranslation | ConfirmationLevel::RejectedSignOff) => {
            SegmentStatus::Rejected
        }
        Some(ConfirmationLevel::Unspecified) | None => SegmentStatus::NotTranslated,
    }
}

/// Write direction: the confirmation level a segment with target text is
/// written with, or `None` when its record must be left untouched.
pub fn confirmation_for_write(status: SegmentStatus) -> Option<ConfirmationLevel> {
    status
        .is_confirmed()
        .then_some(ConfirmationLevel::Translated)
}

/// Attribute changes applied to a confirmation record's start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRewrite {
    pub set: Vec<(&'static str, String)>,
    pub remove: Vec<&'static str>,
}

/// The rewrite for a confirmed segment, or `None` if its status does not
/// map to a confirmation on write.
pub fn record_rewrite(status: SegmentStatus) -> Option<RecordRewrite> {
    let conf = confirmation_for_write(status)?;
    Some(RecordRewrite {
        set: vec![
            (CONF_ATTR, conf.as_str().to_string()),
            (ORIGIN_ATTR, Origin::Interactive.as_str().to_string()),
        ],
        remove: STALE_PROVENANCE_ATTRS.to_vec(),
    })
}

/// Everything a confirmation record says about one segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SegmentMetadata {
    pub conf: Option<ConfirmationLevel>,
    pub origin: Option<Origin>,
    pub origin_system: Option<String>,
    pub percent: u8,
    pub text_match: Option<TextMatch>,
    pub locked: bool,
}

impl SegmentMetadata {
    /// Reads the attributes of an `<sdl:seg>` record. Unknown confirmation
    /// levels read as absent; percentages are clamped to 0..=100.
    pub fn from_record(record: &Element) -> Self {
        SegmentMetadata {
            conf: record.attribute(CONF_ATTR).and_then(|v| v.parse().ok()),
            origin: record.attribute(ORIGIN_ATTR).map(Origin::parse),
            origin_system: record.attribute(ORIGIN_SYSTEM_ATTR).map(str::to_string),
            percent: record
                .attribute(PERCENT_ATTR)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|p| p.clamp(0.0, 100.0).round() as u8)
                .unwrap_or(0),
            text_match: record
                .attribute(TEXT_MATCH_ATTR)
                .and_then(|v| v.parse().ok()),
            locked: record
                .attribute(LOCKED_ATTR)
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        }
    }

    pub fn status(&self) -> SegmentStatus {
        status_from_confirmation(self.conf)
    }
}
