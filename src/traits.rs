//! Traits for reading package documents in sdlpack.

use std::{fs, path::Path};

use crate::error::Error;

/// A trait for parsing one package document (project metadata or a
/// bilingual file) from raw bytes.
///
/// Documents are always read whole: the writer needs the exact original
/// bytes, BOM included, so there is no streaming counterpart.
///
/// # Example
///
/// ```rust,no_run
/// use sdlpack::{BilingualFile, traits::Parser};
/// let file = BilingualFile::read_from("nl-NL/manual.docx.sdlxliff")?;
/// println!("{} segments", file.segments.len());
/// Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Parser {
    /// Parse from bytes. `path` is recorded as the document's origin.
    fn parse_bytes(bytes: &[u8], path: &Path) -> Result<Self, Error>
    where
        Self: Sized;

    /// Parse from file path.
    fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Self::parse_bytes(&bytes, path)
    }

    /// Parse from a string.
    fn from_str(s: &str) -> Result<Self, Error>
    where
        Self: Sized,
    {
        Self::parse_bytes(s.as_bytes(), Path::new(""))
    }
}
