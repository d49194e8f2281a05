//! All error types for the sdlpack crate.
//!
//! Recoverable conditions (a malformed unit, one file failing to save) are
//! logged and recorded in reports instead of being returned from the
//! surrounding operation. The variants below are what is left over: the
//! cases where nothing usable was produced.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Wrong extension, not a ZIP, or a ZIP without the expected layout.
    #[error("format error: {0}")]
    Format(String),

    /// No project metadata file, or a bilingual file without its
    /// `file`/`body` declaration.
    #[error("missing metadata: {0}")]
    MissingMetadata(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    /// One file of a batch could not be patched or written.
    #[error("failed to write `{}`: {source}", path.display())]
    PartialWriteFailure {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("malformed markers: {0}")]
    MalformedMarkers(String),

    #[error("overlapping edits at byte {0}")]
    OverlappingEdits(usize),

    #[error("no package loaded")]
    NoPackageLoaded,

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps an error as the failure of a single file in a batch.
    pub fn partial_write(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::PartialWriteFailure {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Creates a new missing-metadata error
    pub fn missing_metadata(message: impl Into<String>) -> Self {
        Error::MissingMetadata(message.into())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(quick_xml::Error::InvalidAttr(value))
    }
}
