//! Options for loading packages and saving translations.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::markers::MismatchPolicy;

/// Load behavior options for [`crate::Codec`] and [`crate::Package`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadOptions {
    /// Directory to extract packages into. A fresh temporary directory is
    /// used when unset; a directory given here is never deleted.
    pub extraction_dir: Option<PathBuf>,
}

impl LoadOptions {
    /// Creates default load options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the extraction directory.
    pub fn with_extraction_dir(mut self, extraction_dir: Option<PathBuf>) -> Self {
        self.extraction_dir = extraction_dir;
        self
    }
}

/// Save behavior options for write-back and return-package assembly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveOptions {
    /// How unbalanced markers in target text are handled.
    pub mismatch_policy: MismatchPolicy,
    /// Author recorded in the return package. Falls back to the
    /// `USER`/`USERNAME` environment variables.
    pub author: Option<String>,
    /// Fixed timestamp for the return package; the current time when unset.
    pub timestamp: Option<DateTime<Utc>>,
}

impl SaveOptions {
    /// Creates default save options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the marker mismatch policy.
    pub fn with_mismatch_policy(mut self, mismatch_policy: MismatchPolicy) -> Self {
        self.mismatch_policy = mismatch_policy;
        self
    }

    /// Sets the session author.
    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    /// Pins the timestamp written into the return package.
    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub(crate) fn resolved_author(&self) -> String {
        self.author
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .filter(|author| !author.trim().is_empty())
            .unwrap_or_else(|| "translator".to_string())
    }

    /// Timestamp in the vendor's format, e.g. `2026-10-16T09:30:00Z`.
    pub(crate) fn resolved_timestamp(&self) -> String {
        self.timestamp
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
