//! What an ingestion run produced and what it skipped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use codecorpus_types::Corpus;
use serde::Serialize;

/// Why a file or directory did not make it into the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Another task already claimed this absolute path.
    Duplicate,
    TooLarge { size_bytes: u64, limit_bytes: u64 },
    Unreadable { message: String },
    InvalidUtf8,
    NotAFile,
    DirectoryUnreadable { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => f.write_str("skipped duplicate"),
            Self::TooLarge {
                size_bytes,
                limit_bytes,
            } => write!(f, "too large ({size_bytes} bytes > {limit_bytes} bytes)"),
            Self::Unreadable { message } => write!(f, "unreadable: {message}"),
            Self::InvalidUtf8 => f.write_str("not valid UTF-8"),
            Self::NotAFile => f.write_str("not a regular file"),
            Self::DirectoryUnreadable { message } => {
                write!(f, "directory unreadable: {message}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Counts and skip log for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Files that passed listing filters and were scheduled.
    pub files_found: usize,
    /// Files that were read and added to the corpus.
    pub files_ingested: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl IngestReport {
    pub fn duplicates(&self) -> impl Iterator<Item = &Path> {
        self.skipped
            .iter()
            .filter(|entry| entry.reason == SkipReason::Duplicate)
            .map(|entry| entry.path.as_path())
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Whether the run visited everything or stopped early on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Complete,
    /// Cancellation was requested; the corpus holds whatever finished first.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub corpus: Corpus,
    pub report: IngestReport,
    pub completion: Completion,
}

impl IngestOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }
}

/// Thread-safe builder for an [`IngestReport`].
#[derive(Debug, Default)]
pub(crate) struct ReportCollector {
    files_found: AtomicUsize,
    files_ingested: AtomicUsize,
    skipped: Mutex<Vec<SkippedEntry>>,
}

impl ReportCollector {
    pub(crate) fn found(&self) {
        self.files_found.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn ingested(&self) {
        self.files_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skip(&self, path: &Path, reason: SkipReason) {
        self.skipped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SkippedEntry {
                path: path.to_path_buf(),
                reason,
            });
    }

    /// Drains the skip log. Call once every worker has finished.
    pub(crate) fn finish(&self) -> IngestReport {
        let mut skipped = std::mem::take(
            &mut *self.skipped.lock().unwrap_or_else(PoisonError::into_inner),
        );
        skipped.sort_by(|a, b| a.path.cmp(&b.path));
        IngestReport {
            files_found: self.files_found.load(Ordering::Relaxed),
            files_ingested: self.files_ingested.load(Ordering::Relaxed),
            skipped,
        }
    }
}
