//! Bilingual-package codec for Trados-style translation packages.
//!
//! Extracts project packages (`.sdlppx`), parses the SDLXLIFF files inside,
//! exposes their segments with inline formatting as simple `<id>…</id>`
//! markers, writes translations back byte-for-byte outside the translated
//! content, and assembles the return package (`.sdlrpx`).
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use sdlpack::{Codec, SegmentStatus, SegmentUpdate};
//!
//! let mut codec = Codec::new();
//! let summary = codec.load(["Manual.sdlppx"])?;
//! println!("{} segments", summary.segment_count);
//!
//! let mut mapping = HashMap::new();
//! mapping.insert(
//!     "3_1".to_string(),
//!     SegmentUpdate::new("Hallo <10>wereld</10>", SegmentStatus::Translated),
//! );
//! codec.update(&mapping);
//! let returned = codec.assemble_return_package(None)?;
//! println!("wrote {}", returned.display());
//! codec.release()?;
//! # Ok::<(), sdlpack::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod codec;
pub mod encoding;
pub mod error;
pub mod formats;
pub mod markers;
pub mod options;
pub mod package;
pub mod patch;
pub mod status;
pub mod traits;
pub mod types;
pub mod writer;
pub mod xml;

// Re-export most used types for easy consumption
pub use crate::{
    codec::{Codec, LoadSummary, UpdateReport},
    error::Error,
    formats::{FormatType, ProjectMetadata, XliffParser},
    markers::MismatchPolicy,
    options::{LoadOptions, SaveOptions},
    package::{Package, PackageKind},
    status::{ConfirmationLevel, Origin, TextMatch},
    types::{BilingualFile, Segment, SegmentStatus, SegmentUpdate},
    writer::SaveReport,
};
