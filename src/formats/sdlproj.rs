//! Support for `.sdlproj` project metadata.
//!
//! Reading goes through the XML tree; the return-package patch works on the
//! raw text so everything it does not touch stays byte-identical.

use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    encoding,
    error::Error,
    patch::{EditList, rewrite_start_tag, start_tag_attribute, start_tag_attributes},
    traits::Parser,
    xml::{self, Element},
};

/// File extension of project metadata inside a package.
pub const EXTENSION: &str = "sdlproj";

/// `PackageType` of an outbound package.
pub const PROJECT_PACKAGE: &str = "ProjectPackage";

/// `PackageType` of a package sent back to the vendor.
pub const RETURN_PACKAGE: &str = "ReturnPackage";

lazy_static! {
    static ref PROJECT_TAG_REGEX: Regex = Regex::new(r"<Project\b[^>]*>").unwrap();
    static ref CONFIRMATION_STATISTICS_REGEX: Regex =
        Regex::new(r"(?s)<ConfirmationStatistics\b.*?</ConfirmationStatistics>").unwrap();
    static ref DRAFT_TAG_REGEX: Regex = Regex::new(r"<Draft\b[^>]*>").unwrap();
    static ref TRANSLATED_TAG_REGEX: Regex = Regex::new(r"<Translated\b[^>]*>").unwrap();
    static ref MANUAL_TASK_TAG_REGEX: Regex = Regex::new(r"<ManualTask\b[^>]*>").unwrap();
    // whole element with its indentation and line ending
    static ref AUTOMATIC_TASK_REGEX: Regex = Regex::new(
        r"(?s)[ \t]*<AutomaticTask\b(?:[^>]*?/>|.*?</AutomaticTask>)[ \t]*(?:\r?\n)?"
    )
    .unwrap();
    static ref TERMBASE_CONFIGURATION_REGEX: Regex = Regex::new(
        r"(?s)[ \t]*<TermbaseConfiguration\b(?:[^>]*?/>|.*?</TermbaseConfiguration>)[ \t]*(?:\r?\n)?"
    )
    .unwrap();
}

/// What the root-level `.sdlproj` says about a package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectMetadata {
    pub path: PathBuf,
    /// `GeneralProjectInfo@Name`, or the file stem.
    pub name: String,
    /// `ProjectPackage` or `ReturnPackage`, as written.
    pub package_type: Option<String>,
    pub created_at: Option<String>,
    pub created_by: Option<String>,
    /// Codes of the first `LanguageDirection`.
    pub source_language: String,
    pub target_language: String,
}

impl ProjectMetadata {
    pub fn is_return_package(&self) -> bool {
        self.package_type.as_deref() == Some(RETURN_PACKAGE)
    }

    fn from_root(root: &Element, path: &Path) -> Result<Self, Error> {
        if root.name != "Project" {
            return Err(Error::missing_metadata(format!(
                "{}: root element is not <Project>",
                path.display()
            )));
        }

        let mut directions = Vec::new();
        root.find_descendants(&|e: &Element| e.name == "LanguageDirection", &mut directions);
        let direction = directions.first().ok_or_else(|| {
            Error::missing_metadata(format!("{}: no language direction", path.display()))
        })?;
        let code = |name: &str| {
            direction
                .attribute(name)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::missing_metadata(format!("{}: no {}", path.display(), name))
                })
        };

        let mut info = Vec::new();
        root.find_descendants(&|e: &Element| e.name == "GeneralProjectInfo", &mut info);
        let name = info
            .first()
            .and_then(|e| e.attribute("Name"))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        Ok(ProjectMetadata {
            path: path.to_path_buf(),
            name,
            package_type: root.attribute("PackageType").map(str::to_string),
            created_at: root.attribute("PackageCreatedAt").map(str::to_string),
            created_by: root.attribute("PackageCreatedBy").map(str::to_string),
            source_language: code("SourceLanguageCode")?,
            target_language: code("TargetLanguageCode")?,
        })
    }
}

impl Parser for ProjectMetadata {
    fn parse_bytes(bytes: &[u8], path: &Path) -> Result<Self, Error> {
        let decoded = encoding::decode(bytes)?;
        let root = xml::parse_document(&decoded.text)?;
        Self::from_root(&root, path)
    }
}

/// Patches project metadata bytes into return-package form, keeping the
/// original encoding and BOM.
pub fn patch_for_return(original: &[u8], author: &str, timestamp: &str) -> Result<Vec<u8>, Error> {
    let decoded = encoding::decode(original)?;
    let patched = patch_text_for_return(&decoded.text, author, timestamp)?;
    Ok(decoded.encode(&patched))
}

/// Patches project metadata text into return-package form.
///
/// The package becomes a `ReturnPackage` created by `author` at `timestamp`;
/// draft confirmation counts move into the translated bucket; open manual
/// tasks are completed; automatic tasks and termbase configuration are
/// removed.
pub fn patch_text_for_return(text: &str, author: &str, timestamp: &str) -> Result<String, Error> {
    let mut edits = EditList::new();

    let removed: Vec<Range<usize>> = AUTOMATIC_TASK_REGEX
        .find_iter(text)
        .chain(TERMBASE_CONFIGURATION_REGEX.find_iter(text))
        .map(|m| m.range())
        .collect();
    let is_removed = |range: &Range<usize>| {
        removed
            .iter()
            .any(|r| r.start <= range.start && range.end <= r.end)
    };
    for range in &removed {
        edits.replace(range.clone(), "");
    }

    let project = PROJECT_TAG_REGEX
        .find(text)
        .ok_or_else(|| Error::missing_metadata("no <Project> element"))?;
    edits.replace(
        project.range(),
        rewrite_start_tag(
            project.as_str(),
            &[
                ("PackageType", RETURN_PACKAGE.to_string()),
                ("PackageCreatedAt", timestamp.to_string()),
                ("PackageCreatedBy", author.to_string()),
            ],
            &[],
        ),
    );

    for block in CONFIRMATION_STATISTICS_REGEX.find_iter(text) {
        if is_removed(&block.range()) {
            continue;
        }
        let offset = block.start();
        let drafts = DRAFT_TAG_REGEX.find_iter(block.as_str());
        let translated = TRANSLATED_TAG_REGEX.find_iter(block.as_str());
        // Draft and Translated buckets pair up in document order
        for (draft, translated) in drafts.zip(translated) {
            let (draft_tag, translated_tag) = move_draft_counts(draft.as_str(), translated.as_str());
            edits.replace(offset + draft.start()..offset + draft.end(), draft_tag);
            edits.replace(
                offset + translated.start()..offset + translated.end(),
                translated_tag,
            );
        }
    }

    let mut completed = 0;
    for task in MANUAL_TASK_TAG_REGEX.find_iter(text) {
        if is_removed(&task.range()) || start_tag_attribute(task.as_str(), "Status") == Some("Completed") {
            continue;
        }
        edits.replace(
            task.range(),
            rewrite_start_tag(
                task.as_str(),
                &[
                    ("Status", "Completed".to_string()),
                    ("PercentComplete", "100".to_string()),
                    ("CompletedAt", timestamp.to_string()),
                ],
                &[],
            ),
        );
        completed += 1;
    }

    debug!(
        "return metadata: {} sections removed, {} manual tasks completed",
        removed.len(),
        completed
    );
    edits.apply(text)
}

/// Adds every numeric attribute of the draft bucket into the translated
/// bucket and zeroes the draft bucket.
fn move_draft_counts(draft: &str, translated: &str) -> (String, String) {
    let counts: Vec<(&str, u64)> = start_tag_attributes(draft)
        .into_iter()
        .filter_map(|(name, value)| value.trim().parse::<u64>().ok().map(|n| (name, n)))
        .collect();

    let sums: Vec<(&str, String)> = counts
        .iter()
        .map(|(name, n)| {
            let existing = start_tag_attribute(translated, name)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0);
            (*name, (existing + n).to_string())
        })
        .collect();
    let zeros: Vec<(&str, String)> = counts.iter().map(|(name, _)| (*name, "0".to_string())).collect();

    (
        rewrite_start_tag(draft, &zeros, &[]),
        rewrite_start_tag(translated, &sums, &[]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const PROJECT: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <Project Guid="p1" PackageCreatedAt="2024-03-01T09:00:00Z" PackageCreatedBy="VENDOR\pm" PackageType="ProjectPackage" Version="4.0.0.0">
          <LanguageDirections>
            <LanguageDirection Guid="ld1" SourceLanguageCode="en-US" TargetLanguageCode="nl-NL">
              <ConfirmationStatistics>
                <CombinedConfirmationStatistics>
                  <Unspecified Segments="4" Words="30" />
                  <Draft Segments="3" Words="20" Characters="112" />
                  <Translated Segments="1" Words="5" Characters="31" />
                </CombinedConfirmationStatistics>
              </ConfirmationStatistics>
            </LanguageDirection>
          </LanguageDirections>
          <GeneralProjectInfo Name="Manual Q1" Description="" />
          <Tasks>
            <AutomaticTask Guid="a1" Status="Completed">
              <Reports />
            </AutomaticTask>
            <AutomaticTask Guid="a2" Status="Completed" />
            <ManualTask Guid="m1" Status="Assigned" PercentComplete="0" Name="Translate">
              <Files />
            </ManualTask>
            <ManualTask Guid="m0" Status="Completed" PercentComplete="100" CompletedAt="2024-02-01T00:00:00Z" />
          </Tasks>
          <TermbaseConfiguration>
            <Termbases />
          </TermbaseConfiguration>
        </Project>
    "#};

    const NOW: &str = "2024-04-02T10:30:00Z";

    #[test]
    fn test_parse_metadata() {
        let meta = ProjectMetadata::parse_bytes(PROJECT.as_bytes(), Path::new("Manual.sdlproj"))
            .unwrap();
        assert_eq!(meta.name, "Manual Q1");
        assert_eq!(meta.package_type.as_deref(), Some(PROJECT_PACKAGE));
        assert!(!meta.is_return_package());
        assert_eq!(meta.created_by.as_deref(), Some(r"VENDOR\pm"));
        assert_eq!(meta.source_language, "en-US");
        assert_eq!(meta.target_language, "nl-NL");
    }

    #[test]
    fn test_name_falls_back_to_file_stem() {
        let doc = r#"<Project><LanguageDirection SourceLanguageCode="en" TargetLanguageCode="de"/></Project>"#;
        let meta = ProjectMetadata::parse_bytes(doc.as_bytes(), Path::new("dir/Handbook.sdlproj"))
            .unwrap();
        assert_eq!(meta.name, "Handbook");
        assert_eq!(meta.package_type, None);
    }

    #[test]
    fn test_missing_language_direction() {
        let doc = r#"<Project PackageType="ProjectPackage"/>"#;
        assert!(matches!(
            ProjectMetadata::from_str(doc),
            Err(Error::MissingMetadata(_))
        ));
        assert!(matches!(
            ProjectMetadata::from_str("<Other/>"),
            Err(Error::MissingMetadata(_))
        ));
    }

    #[test]
    fn test_patch_for_return() {
        let patched = patch_text_for_return(PROJECT, "translator", NOW).unwrap();

        assert!(patched.contains(
            r#"<Project Guid="p1" PackageCreatedAt="2024-04-02T10:30:00Z" PackageCreatedBy="translator" PackageType="ReturnPackage" Version="4.0.0.0">"#
        ));
        assert!(patched.contains(r#"<Draft Segments="0" Words="0" Characters="0" />"#));
        assert!(patched.contains(r#"<Translated Segments="4" Words="25" Characters="143" />"#));
        assert!(patched.contains(r#"<Unspecified Segments="4" Words="30" />"#));
        assert!(patched.contains(
            r#"<ManualTask Guid="m1" Status="Completed" PercentComplete="100" Name="Translate" CompletedAt="2024-04-02T10:30:00Z">"#
        ));
        assert!(patched.contains(r#"CompletedAt="2024-02-01T00:00:00Z" />"#));
        assert!(!patched.contains("AutomaticTask"));
        assert!(!patched.contains("Termbase"));
        assert!(patched.contains("  <Tasks>\n    <ManualTask"));
        assert!(patched.contains("  </Tasks>\n</Project>"));

        let meta = ProjectMetadata::from_str(&patched).unwrap();
        assert!(meta.is_return_package());
        assert_eq!(meta.created_at.as_deref(), Some(NOW));
    }

    #[test]
    fn test_patch_keeps_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(PROJECT.as_bytes());
        let patched = patch_for_return(&bytes, "translator", NOW).unwrap();
        assert_eq!(&patched[..3], &[0xEF, 0xBB, 0xBF]);
        assert!(String::from_utf8_lossy(&patched).contains("ReturnPackage"));
    }
}
