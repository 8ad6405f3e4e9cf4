//! Concurrent corpus builder shared by ingestion workers.

use std::path::{Path, PathBuf};

use codecorpus_types::{Corpus, FileRecord};
use dashmap::{DashMap, DashSet};

/// Extension -> files map that many workers can append to at once.
///
/// Paths are claimed before their file is read, so the same absolute path is
/// never scheduled twice. Each extension bucket is locked independently.
#[derive(Debug, Default)]
pub struct CorpusAccumulator {
    claimed: DashSet<PathBuf>,
    groups: DashMap<String, Vec<FileRecord>>,
}

impl CorpusAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the accumulator with an existing corpus so new work deduplicates against it.
    #[must_use]
    pub fn from_corpus(corpus: Corpus) -> Self {
        let accumulator = Self::new();
        for record in corpus.into_records() {
            accumulator.claimed.insert(record.absolute_path().to_path_buf());
            accumulator.push(record);
        }
        accumulator
    }

    /// Returns `false` if the path was already claimed.
    pub fn claim(&self, path: &Path) -> bool {
        self.claimed.insert(path.to_path_buf())
    }

    /// Gives up a claim whose file could not be read.
    pub fn release(&self, path: &Path) {
        self.claimed.remove(path);
    }

    /// Adds a record for a path previously returned `true` from [`claim`](Self::claim).
    pub fn push(&self, record: FileRecord) {
        self.groups
            .entry(record.extension().to_string())
            .or_default()
            .push(record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.value().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn into_corpus(self) -> Corpus {
        self.take_corpus()
    }

    /// Moves every pushed record out into a [`Corpus`], leaving the claims in place.
    ///
    /// Used once all workers sharing the accumulator have finished.
    #[must_use]
    pub fn take_corpus(&self) -> Corpus {
        let extensions: Vec<String> = self.groups.iter().map(|group| group.key().clone()).collect();
        let mut corpus = Corpus::new();
        for extension in extensions {
            let Some((_, records)) = self.groups.remove(&extension) else {
                continue;
            };
            for record in records {
                if let Err(dup) = corpus.insert(record) {
                    tracing::debug!(path = %dup.path.display(), "Dropped unclaimed duplicate");
                }
            }
        }
        corpus
    }
}
