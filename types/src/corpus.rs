//! Ingested files and the extension-grouped corpus that owns them.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::extension::extension_of;

/// One ingested text file.
///
/// Created once at ingestion time and never mutated afterwards. The extension
/// is derived from the absolute path so it always agrees with the file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    absolute_path: PathBuf,
    relative_path: String,
    extension: String,
    content: String,
}

impl FileRecord {
    #[must_use]
    pub fn new(absolute_path: PathBuf, relative_path: impl Into<String>, content: String) -> Self {
        let extension = extension_of(&absolute_path);
        Self {
            absolute_path,
            relative_path: relative_path.into(),
            extension,
            content,
        }
    }

    #[must_use]
    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Lowercase extension with a leading dot, or `""`.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.content.len()
    }
}

#[derive(Debug, Clone, Error)]
#[error("file already present in corpus: {}", path.display())]
pub struct DuplicatePathError {
    pub path: PathBuf,
}

/// Extension -> files mapping produced by ingestion.
///
/// No two records share an absolute path. Within one extension group records
/// keep insertion order; callers that need a stable display order use
/// [`Corpus::sorted_records`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Corpus {
    groups: BTreeMap<String, Vec<FileRecord>>,
    #[serde(skip)]
    paths: HashSet<PathBuf>,
}

impl Corpus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record; the first record for a given absolute path wins.
    pub fn insert(&mut self, record: FileRecord) -> Result<(), DuplicatePathError> {
        if !self.paths.insert(record.absolute_path.clone()) {
            return Err(DuplicatePathError {
                path: record.absolute_path,
            });
        }
        self.groups
            .entry(record.extension.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    /// Moves every record of `other` into `self`.
    ///
    /// Returns the absolute paths that were dropped because `self` already held them.
    pub fn merge(&mut self, other: Corpus) -> Vec<PathBuf> {
        let mut dropped = Vec::new();
        for record in other.into_records() {
            if let Err(dup) = self.insert(record) {
                dropped.push(dup.path);
            }
        }
        dropped
    }

    /// Total number of files across all extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    #[must_use]
    pub fn contains_path(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Distinct extensions in sorted order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    #[must_use]
    pub fn files(&self, extension: &str) -> &[FileRecord] {
        self.groups.get(extension).map_or(&[], Vec::as_slice)
    }

    /// Extension groups in sorted extension order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FileRecord])> {
        self.groups
            .iter()
            .map(|(ext, files)| (ext.as_str(), files.as_slice()))
    }

    /// Every record, grouped by extension.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.groups.values().flatten()
    }

    /// Consumes the corpus, yielding its records grouped by extension.
    pub fn into_records(self) -> impl Iterator<Item = FileRecord> {
        self.groups.into_values().flatten()
    }

    /// Every record ordered by relative path, for file-list display.
    #[must_use]
    pub fn sorted_records(&self) -> Vec<&FileRecord> {
        let mut records: Vec<&FileRecord> = self.records().collect();
        records.sort_by(|a, b| {
            a.relative_path
                .cmp(&b.relative_path)
                .then_with(|| a.absolute_path.cmp(&b.absolute_path))
        });
        records
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.records().map(FileRecord::size_bytes).sum()
    }
}
