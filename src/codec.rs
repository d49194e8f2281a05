/// This module provides the `Codec` struct, the entry point a host editor uses
/// to work with vendor packages and loose bilingual files.
///
/// A `Codec` loads packages (`.sdlppx`/`.sdlrpx`) and bare `.sdlxliff` files,
/// exposes their segments as one flat list, applies translations keyed by
/// segment id, saves them back byte-preservingly, and assembles the return
/// package.
///
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    formats::FormatType,
    options::{LoadOptions, SaveOptions},
    package::{Package, PackageKind},
    traits::Parser,
    types::{BilingualFile, Segment, SegmentUpdate},
    writer::{self, SaveReport},
};

/// What a call to [`Codec::load`] found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoadSummary {
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub file_count: usize,
    pub segment_count: usize,
    /// Files that parsed but yielded no segments.
    pub suspect_files: Vec<PathBuf>,
    /// Bilingual files inside a package that failed to parse, with the reason.
    pub skipped_files: Vec<(PathBuf, String)>,
    /// Paths passed to [`Codec::load`] that could not be loaded, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// What a call to [`Codec::update`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpdateReport {
    /// Number of segments updated.
    pub applied: usize,
    /// Ids that matched no segment, sorted.
    pub unknown: Vec<String>,
    /// Ids found in more than one file; the update went to all of them.
    pub ambiguous: Vec<String>,
}

/// Holds the loaded packages and loose bilingual files.
#[derive(Debug, Default)]
pub struct Codec {
    /// Packages, in load order.
    pub packages: Vec<Package>,
    /// Bilingual files loaded on their own, in load order.
    pub files: Vec<BilingualFile>,
    load_options: LoadOptions,
    save_options: SaveOptions,
}

impl Codec {
    /// Creates a new, empty `Codec` with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the options used by [`Codec::load`].
    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }

    /// Replaces the options used by [`Codec::save`] and
    /// [`Codec::assemble_return_package`].
    pub fn with_save_options(mut self, options: SaveOptions) -> Self {
        self.save_options = options;
        self
    }

    /// Loads packages and bilingual files.
    ///
    /// # Parameters
    /// - `paths`: each a `.sdlppx`/`.sdlrpx` package or a `.sdlxliff` file.
    ///
    /// # Returns
    ///
    /// A [`LoadSummary`] over everything loaded by this call. A path that
    /// fails is logged, listed in [`LoadSummary::failed`] and does not stop
    /// the others. The first error is returned only when paths were given
    /// and none of them loaded.
    pub fn load<I, P>(&mut self, paths: I) -> Result<LoadSummary, Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut packages = Vec::new();
        let mut files = Vec::new();
        let mut failed = Vec::new();
        let mut first_error = None;

        for path in paths {
            let path = path.as_ref();
            let result = if PackageKind::from_path(path).is_some() {
                Package::open(path, &self.load_options).map(|p| packages.push(p))
            } else if FormatType::from_path(path) == Some(FormatType::Bilingual) {
                BilingualFile::read_from(path).map(|f| files.push(f))
            } else {
                Err(Error::Format(format!(
                    "{}: unsupported file type",
                    path.display()
                )))
            };
            if let Err(e) = result {
                warn!("failed to load {}: {}", path.display(), e);
                failed.push((path.to_path_buf(), e.to_string()));
                first_error.get_or_insert(e);
            }
        }

        if packages.is_empty() && files.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let mut summary = LoadSummary {
            failed,
            ..Default::default()
        };
        for package in &packages {
            summary
                .source_language
                .get_or_insert_with(|| package.metadata.source_language.clone());
            summary
                .target_language
                .get_or_insert_with(|| package.metadata.target_language.clone());
            summary.skipped_files.extend(package.skipped.iter().cloned());
        }
        let loaded = packages.iter().flat_map(|p| p.files.iter()).chain(&files);
        for file in loaded {
            summary
                .source_language
                .get_or_insert_with(|| file.source_language.clone());
            summary
                .target_language
                .get_or_insert_with(|| file.target_language.clone());
            summary.file_count += 1;
            summary.segment_count += file.segments.len();
            if file.is_suspect() {
                summary.suspect_files.push(file.path.clone());
            }
        }

        debug!(
            "loaded {} files with {} segments",
            summary.file_count, summary.segment_count
        );
        self.packages.append(&mut packages);
        self.files.append(&mut files);
        Ok(summary)
    }

    /// Iterates over every loaded bilingual file, packages first.
    pub fn bilingual_files(&self) -> impl Iterator<Item = &BilingualFile> {
        self.packages
            .iter()
            .flat_map(|p| p.files.iter())
            .chain(self.files.iter())
    }

    fn bilingual_files_mut(&mut self) -> impl Iterator<Item = &mut BilingualFile> {
        self.packages
            .iter_mut()
            .flat_map(|p| p.files.iter_mut())
            .chain(self.files.iter_mut())
    }

    /// All segments, in file and document order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.bilingual_files().flat_map(|f| f.segments.iter())
    }

    /// The segments of one loaded file, or `None` if it is not loaded.
    pub fn segments_in<P: AsRef<Path>>(&self, path: P) -> Option<&[Segment]> {
        let path = path.as_ref();
        self.bilingual_files()
            .find(|f| f.path == path)
            .map(|f| f.segments.as_slice())
    }

    /// Applies translations keyed by segment id.
    ///
    /// An id present in several files is applied to all of them and
    /// reported as ambiguous.
    pub fn update(&mut self, mapping: &HashMap<String, SegmentUpdate>) -> UpdateReport {
        apply_updates(self.bilingual_files_mut(), mapping)
    }

    /// Applies translations to the segments of one file only.
    ///
    /// Every id is reported unknown if the file is not loaded.
    pub fn update_in<P: AsRef<Path>>(
        &mut self,
        path: P,
        mapping: &HashMap<String, SegmentUpdate>,
    ) -> UpdateReport {
        let path = path.as_ref();
        if !self.bilingual_files().any(|f| f.path == path) {
            warn!("{} is not loaded", path.display());
        }
        apply_updates(
            self.bilingual_files_mut().filter(|f| f.path == path),
            mapping,
        )
    }

    /// Writes modified segments back into every loaded file.
    ///
    /// # Returns
    ///
    /// A [`SaveReport`]; a file that fails is reported there and does not
    /// stop the others.
    pub fn save(&mut self) -> SaveReport {
        let policy = self.save_options.mismatch_policy;
        writer::write_files(self.bilingual_files_mut(), policy)
    }

    /// Saves and assembles the return package of the first loaded package.
    ///
    /// # Parameters
    /// - `output`: where to write it; defaults to the package path with the
    ///   `.sdlrpx` extension.
    ///
    /// # Returns
    ///
    /// The path written, or [`Error::NoPackageLoaded`] if only loose files
    /// are loaded.
    pub fn assemble_return_package(&mut self, output: Option<&Path>) -> Result<PathBuf, Error> {
        if self.packages.len() > 1 {
            warn!(
                "{} packages loaded, assembling {}",
                self.packages.len(),
                self.packages[0].path.display()
            );
        }
        let package = self.packages.first_mut().ok_or(Error::NoPackageLoaded)?;
        package.assemble_return_package(output, &self.save_options)
    }

    /// Unloads everything and removes temporary extraction directories.
    ///
    /// Every package is released even if one fails; the first failure is
    /// returned.
    pub fn release(&mut self) -> Result<(), Error> {
        let mut result = Ok(());
        for mut package in self.packages.drain(..) {
            if let Err(e) = package.release() {
                warn!("failed to release {}: {}", package.path.display(), e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        self.files.clear();
        result
    }
}

fn apply_updates<'a>(
    files: impl Iterator<Item = &'a mut BilingualFile>,
    mapping: &HashMap<String, SegmentUpdate>,
) -> UpdateReport {
    let mut hits: HashMap<&str, usize> = HashMap::new();
    let mut report = UpdateReport::default();

    for file in files {
        for segment in &mut file.segments {
            if let Some((id, update)) = mapping.get_key_value(&segment.segment_id) {
                segment.apply(update);
                *hits.entry(id.as_str()).or_default() += 1;
                report.applied += 1;
            }
        }
    }

    for id in mapping.keys() {
        match hits.get(id.as_str()) {
            None => report.unknown.push(id.clone()),
            Some(&count) if count > 1 => {
                warn!("segment id {} found in {} files", id, count);
                report.ambiguous.push(id.clone());
            }
            Some(_) => {}
        }
    }
    report.unknown.sort();
    report.ambiguous.sort();
    if !report.unknown.is_empty() {
        debug!("{} unknown segment ids", report.unknown.len());
    }
    report
}
