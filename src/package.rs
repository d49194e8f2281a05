//! Project and return packages.
//!
//! A package is a ZIP archive holding one root-level `.sdlproj`, a folder
//! per language and auxiliary folders (reports, settings). Opening one
//! extracts it to disk; the bilingual files of the target-language folder are
//! patched in place there, and a return package is zipped from the
//! metadata, the source folder and the target folder only.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use tempfile::{NamedTempFile, TempDir};
use unic_langid::LanguageIdentifier;
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::{
    error::Error,
    formats::{FormatType, ProjectMetadata, sdlproj},
    options::{LoadOptions, SaveOptions},
    traits::Parser,
    types::BilingualFile,
    writer::{self, SaveReport},
};

/// The two package kinds exchanged with a vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// `.sdlppx`, sent to the translator.
    Project,
    /// `.sdlrpx`, sent back to the vendor.
    Return,
}

impl PackageKind {
    pub fn extension(&self) -> &'static str {
        match self {
            PackageKind::Project => "sdlppx",
            PackageKind::Return => "sdlrpx",
        }
    }

    /// Infers the kind from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        [PackageKind::Project, PackageKind::Return]
            .into_iter()
            .find(|kind| extension.eq_ignore_ascii_case(kind.extension()))
    }
}

/// Where a package was extracted.
#[derive(Debug)]
enum ExtractionDir {
    /// Removed on drop or [`Package::release`].
    Temp(TempDir),
    /// Supplied by the caller; never deleted.
    Provided(PathBuf),
}

impl ExtractionDir {
    fn path(&self) -> &Path {
        match self {
            ExtractionDir::Temp(dir) => dir.path(),
            ExtractionDir::Provided(path) => path,
        }
    }
}

/// An opened package.
#[derive(Debug)]
pub struct Package {
    /// The archive this package was opened from.
    pub path: PathBuf,
    pub kind: PackageKind,
    pub metadata: ProjectMetadata,
    pub source_dir: Option<PathBuf>,
    pub target_dir: Option<PathBuf>,
    /// Bilingual files of the target-language folder, in path order.
    pub files: Vec<BilingualFile>,
    /// Bilingual files that failed to parse, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    extraction: Option<ExtractionDir>,
}

impl Package {
    /// Extracts and parses a package.
    pub fn open<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self, Error> {
        let path = path.as_ref();
        let kind = PackageKind::from_path(path).ok_or_else(|| {
            Error::Format(format!(
                "{}: not a project or return package",
                path.display()
            ))
        })?;

        let mut archive = ZipArchive::new(File::open(path)?)
            .map_err(|e| Error::Format(format!("{}: not a ZIP archive ({})", path.display(), e)))?;

        let extraction = match &options.extraction_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                ExtractionDir::Provided(dir.clone())
            }
            None => ExtractionDir::Temp(tempfile::Builder::new().prefix("sdlpack-").tempdir()?),
        };
        let root = extraction.path().to_path_buf();
        extract(&mut archive, &root)?;

        let metadata_path = find_metadata(&root)?;
        let metadata = ProjectMetadata::read_from(&metadata_path)?;
        let folders = language_folders(&root)?;

        let source_dir = folders
            .iter()
            .find(|name| name.eq_ignore_ascii_case(&metadata.source_language))
            .map(|name| root.join(name));
        let target_dir =
            resolve_target_folder(&folders, &metadata.target_language, &metadata.source_language)
                .map(|name| root.join(name));

        let mut package = Package {
            path: path.to_path_buf(),
            kind,
            metadata,
            source_dir,
            target_dir,
            files: Vec::new(),
            skipped: Vec::new(),
            extraction: Some(extraction),
        };

        match package.target_dir.clone() {
            Some(dir) => package.load_bilingual_files(&dir),
            None => warn!(
                "{}: no folder for target language {}",
                path.display(),
                package.metadata.target_language
            ),
        }
        if package.source_dir.is_none() {
            warn!(
                "{}: no folder for source language {}",
                path.display(),
                package.metadata.source_language
            );
        }

        debug!(
            "opened {} ({} files, {} segments)",
            path.display(),
            package.files.len(),
            package.segment_count()
        );
        Ok(package)
    }

    fn load_bilingual_files(&mut self, dir: &Path) {
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("{}: {}", dir.display(), e);
                    continue;
                }
            };
            let file_path = entry.path();
            if !entry.file_type().is_file()
                || FormatType::from_path(file_path) != Some(FormatType::Bilingual)
            {
                continue;
            }
            match BilingualFile::read_from(file_path) {
                Ok(file) => self.files.push(file),
                Err(e) => {
                    warn!("{}: {}, file skipped", file_path.display(), e);
                    self.skipped.push((file_path.to_path_buf(), e.to_string()));
                }
            }
        }
    }

    /// Root of the extracted package, until released.
    pub fn extraction_root(&self) -> Option<&Path> {
        self.extraction.as_ref().map(ExtractionDir::path)
    }

    pub fn segment_count(&self) -> usize {
        self.files.iter().map(|f| f.segments.len()).sum()
    }

    /// Writes modified segments back into the extracted files.
    pub fn save(&mut self, options: &SaveOptions) -> SaveReport {
        writer::write_files(self.files.iter_mut(), options.mismatch_policy)
    }

    /// Saves, then zips a return package.
    ///
    /// `output` defaults to the package path with the `.sdlrpx` extension.
    /// A file that fails to save is logged and zipped as it is on disk.
    pub fn assemble_return_package(
        &mut self,
        output: Option<&Path>,
        options: &SaveOptions,
    ) -> Result<PathBuf, Error> {
        let root = self
            .extraction_root()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::Format(format!("{} was released", self.path.display())))?;

        let report = self.save(options);
        for failure in &report.failures {
            warn!("return package: {}", failure);
        }

        let metadata = patch_metadata(&self.metadata.path, options)?;
        let output = output.map_or_else(
            || self.path.with_extension(PackageKind::Return.extension()),
            Path::to_path_buf,
        );

        let mut entries = Vec::new();
        for dir in [&self.source_dir, &self.target_dir].into_iter().flatten() {
            for entry in WalkDir::new(dir).sort_by_file_name() {
                let entry = entry.map_err(io::Error::from)?;
                if entry.file_type().is_file() {
                    entries.push(entry.into_path());
                }
            }
        }
        if self.target_dir.is_none() {
            warn!(
                "{}: return package has no target-language folder",
                output.display()
            );
        }

        let parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;
        let temp = NamedTempFile::new_in(parent)?;
        let mut zip = ZipWriter::new(temp.reopen()?);
        let zip_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        zip.start_file(entry_name(&root, &self.metadata.path), zip_options)?;
        zip.write_all(&metadata)?;
        for path in &entries {
            zip.start_file(entry_name(&root, path), zip_options)?;
            zip.write_all(&fs::read(path)?)?;
        }
        zip.finish()?;
        temp.persist(&output).map_err(|e| Error::Io(e.error))?;

        debug!(
            "assembled {} ({} files)",
            output.display(),
            entries.len() + 1
        );
        Ok(output)
    }

    /// Deletes a temporary extraction directory now instead of on drop.
    ///
    /// A caller-supplied directory is left in place. Calling this twice is
    /// a no-op.
    pub fn release(&mut self) -> Result<(), Error> {
        match self.extraction.take() {
            Some(ExtractionDir::Temp(dir)) => {
                debug!("removing {}", dir.path().display());
                dir.close()?;
            }
            Some(ExtractionDir::Provided(_)) | None => {}
        }
        Ok(())
    }
}

fn extract<R: io::Read + io::Seek>(archive: &mut ZipArchive<R>, root: &Path) -> Result<(), Error> {
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("unsafe entry name {} skipped", entry.name());
            continue;
        };
        let out = root.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&out)?;
        io::copy(&mut entry, &mut file)?;
    }
    Ok(())
}

/// The root-level `.sdlproj`; the first by name if there are several.
fn find_metadata(root: &Path) -> Result<PathBuf, Error> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_file() && FormatType::from_path(&path) == Some(FormatType::ProjectMetadata) {
            candidates.push(path);
        }
    }
    candidates.sort();
    if candidates.len() > 1 {
        warn!(
            "{}: {} project files, using {}",
            root.display(),
            candidates.len(),
            candidates[0].display()
        );
    }
    candidates.into_iter().next().ok_or_else(|| {
        Error::missing_metadata(format!("no .{} file in package", sdlproj::EXTENSION))
    })
}

/// Names of the root-level folders, sorted.
fn language_folders(root: &Path) -> Result<Vec<String>, Error> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn parse_language(code: &str) -> Option<LanguageIdentifier> {
    code.replace('_', "-").parse().ok()
}

/// Picks the folder holding the target-language files.
///
/// An exact, case-insensitive match on the code wins. Otherwise the first
/// folder (other than the source-language one) whose primary language
/// subtag matches the target's is used.
pub fn resolve_target_folder<'a>(
    folders: &'a [String],
    target: &str,
    source: &str,
) -> Option<&'a str> {
    if let Some(exact) = folders.iter().find(|name| name.eq_ignore_ascii_case(target)) {
        return Some(exact);
    }
    let target_id = parse_language(target)?;
    folders
        .iter()
        .filter(|name| !name.eq_ignore_ascii_case(source))
        .find(|name| parse_language(name).is_some_and(|id| id.language == target_id.language))
        .map(String::as_str)
}

/// ZIP entry name of a file under `root`, with forward slashes.
fn entry_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn patch_metadata(path: &Path, options: &SaveOptions) -> Result<Vec<u8>, Error> {
    let original = fs::read(path)?;
    sdlproj::patch_for_return(
        &original,
        &options.resolved_author(),
        &options.resolved_timestamp(),
    )
}
