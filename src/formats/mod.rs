pub mod sdlproj;
pub mod sdlxliff;

use std::{fmt::Display, path::Path};

// Reexporting the formats for easier access
pub use sdlproj::ProjectMetadata;
pub use sdlxliff::XliffParser;

/// The document kinds found inside a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatType {
    /// `.sdlxliff`
    Bilingual,
    /// `.sdlproj`
    ProjectMetadata,
}

impl FormatType {
    pub fn extension(&self) -> &'static str {
        match self {
            FormatType::Bilingual => sdlxliff::EXTENSION,
            FormatType::ProjectMetadata => sdlproj::EXTENSION,
        }
    }

    /// Infers the kind from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        [FormatType::Bilingual, FormatType::ProjectMetadata]
            .into_iter()
            .find(|kind| extension.eq_ignore_ascii_case(kind.extension()))
    }
}

impl Display for FormatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatType::Bilingual => write!(f, "Bilingual"),
            FormatType::ProjectMetadata => write!(f, "ProjectMetadata"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(
            FormatType::from_path(Path::new("nl-NL/a.docx.SDLXLIFF")),
            Some(FormatType::Bilingual)
        );
        assert_eq!(
            FormatType::from_path(Path::new("Project.sdlproj")),
            Some(FormatType::ProjectMetadata)
        );
        assert_eq!(FormatType::from_path(Path::new("a.xliff")), None);
        assert_eq!(FormatType::from_path(Path::new("noext")), None);
    }
}
