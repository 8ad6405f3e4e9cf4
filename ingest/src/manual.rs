//! Ingestion of an explicit, caller-chosen file list.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codecorpus_types::Corpus;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::accumulator::CorpusAccumulator;
use crate::progress::ProgressSink;
use crate::report::{IngestOutcome, SkipReason};
use crate::shared::{IngestShared, join_all};

/// Reads user-picked files into a corpus.
///
/// Shares the walker's size ceiling, dedup and grouping rules but applies no
/// extension filter. Reads are bounded by a fixed-size semaphore that clones of
/// the ingestor share, independent of CPU count.
#[derive(Debug, Clone)]
pub struct ManualFileIngestor {
    max_file_size_kb: u64,
    reads: Arc<Semaphore>,
    concurrency: usize,
    progress: Option<ProgressSink>,
    cancel: CancellationToken,
}

impl ManualFileIngestor {
    pub const DEFAULT_CONCURRENCY: usize = 10;

    #[must_use]
    pub fn new(max_file_size_kb: u64) -> Self {
        Self {
            max_file_size_kb,
            reads: Arc::new(Semaphore::new(Self::DEFAULT_CONCURRENCY)),
            concurrency: Self::DEFAULT_CONCURRENCY,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        self.reads = Arc::new(Semaphore::new(concurrency));
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Ingests `paths` into a fresh corpus. Relative paths are computed against `base`.
    pub async fn ingest(&self, paths: &[PathBuf], base: impl AsRef<Path>) -> IngestOutcome {
        self.ingest_into(paths, base, Corpus::new()).await
    }

    /// Ingests `paths` and merges them into `existing`.
    ///
    /// Paths already present in `existing` (for example from a directory
    /// walk) are reported as duplicates and left untouched.
    pub async fn ingest_into(
        &self,
        paths: &[PathBuf],
        base: impl AsRef<Path>,
        existing: Corpus,
    ) -> IngestOutcome {
        let base = base.as_ref();
        let base = tokio::fs::canonicalize(base)
            .await
            .unwrap_or_else(|_| base.to_path_buf());
        let shared = self.shared_for(base, existing);
        self.run(paths, shared).await
    }

    fn shared_for(&self, base: PathBuf, existing: Corpus) -> IngestShared {
        IngestShared::new(
            CorpusAccumulator::from_corpus(existing),
            base,
            self.max_file_size_kb,
            self.progress.clone(),
            self.cancel.clone(),
        )
    }

    /// Spawns one task per selected path, each holding a read permit.
    async fn run(&self, paths: &[PathBuf], shared: IngestShared) -> IngestOutcome {
        let shared = Arc::new(shared);
        let mut tasks = JoinSet::new();
        for path in paths {
            if shared.is_cancelled() {
                break;
            }
            let Ok(permit) = Arc::clone(&self.reads).acquire_owned().await else {
                break;
            };
            let shared = Arc::clone(&shared);
            let path = path.clone();
            tasks.spawn(async move {
                if let Some(path) = admit(&shared, &path).await {
                    shared.ingest_file(path).await;
                }
                drop(permit);
            });
        }
        join_all(&mut tasks).await;
        shared.finish().await
    }
}

/// Resolves `path` and applies the per-file checks. Returns the absolute path to read.
async fn admit(shared: &IngestShared, path: &Path) -> Option<PathBuf> {
    let resolved = match tokio::fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(err) => {
            unreadable(shared, path, &err);
            return None;
        }
    };
    let metadata = match tokio::fs::metadata(&resolved).await {
        Ok(metadata) => metadata,
        Err(err) => {
            unreadable(shared, &resolved, &err);
            return None;
        }
    };
    if !metadata.is_file() {
        tracing::warn!(path = %resolved.display(), "Skipping selection that is not a file");
        shared.skip(&resolved, SkipReason::NotAFile);
        return None;
    }
    if shared.exceeds_limit(metadata.len()) {
        tracing::warn!(
            path = %resolved.display(),
            size_bytes = metadata.len(),
            limit_bytes = shared.limit_bytes(),
            "Skipping file over size limit"
        );
        shared.skip_too_large(&resolved, metadata.len());
        return None;
    }
    shared.found();
    Some(resolved)
}

fn unreadable(shared: &IngestShared, path: &Path, err: &io::Error) {
    tracing::warn!(path = %path.display(), error = %err, "Failed to open selected file");
    shared.skip(
        path,
        SkipReason::Unreadable {
            message: err.to_string(),
        },
    );
}
