//! Per-file ingestion shared by the walker and manual ingestion.

use std::path::{Path, PathBuf};

use codecorpus_types::FileRecord;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::accumulator::CorpusAccumulator;
use crate::paths::relative_path;
use crate::progress::{ProgressSink, ProgressTracker};
use crate::report::{Completion, IngestOutcome, ReportCollector, SkipReason};

#[cfg(test)]
pub(crate) type ReadHook = std::sync::Arc<dyn Fn(&Path) + Send + Sync>;

/// State every worker in one run reads and appends to.
///
/// Shared behind an `Arc` by the spawned per-file and per-directory tasks.
pub(crate) struct IngestShared {
    acc: CorpusAccumulator,
    report: ReportCollector,
    progress: ProgressTracker,
    cancel: CancellationToken,
    base: PathBuf,
    limit_bytes: u64,
    #[cfg(test)]
    read_hook: Option<ReadHook>,
}

impl IngestShared {
    pub(crate) fn new(
        acc: CorpusAccumulator,
        base: PathBuf,
        max_file_size_kb: u64,
        progress: Option<ProgressSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            acc,
            report: ReportCollector::default(),
            progress: ProgressTracker::new(progress),
            cancel,
            base,
            limit_bytes: max_file_size_kb.saturating_mul(1024),
            #[cfg(test)]
            read_hook: None,
        }
    }

    /// Runs `hook` on the worker right before each file is claimed and read.
    #[cfg(test)]
    pub(crate) fn set_read_hook(&mut self, hook: ReadHook) {
        self.read_hook = Some(hook);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn skip(&self, path: &Path, reason: SkipReason) {
        self.report.skip(path, reason);
    }

    pub(crate) fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    pub(crate) fn exceeds_limit(&self, size: u64) -> bool {
        size > self.limit_bytes
    }

    pub(crate) fn skip_too_large(&self, path: &Path, size: u64) {
        self.report.skip(
            path,
            SkipReason::TooLarge {
                size_bytes: size,
                limit_bytes: self.limit_bytes,
            },
        );
    }

    /// Marks a file as scheduled for reading.
    pub(crate) fn found(&self) {
        self.report.found();
        self.progress.file_found();
    }

    /// Reads one file that already passed the size ceiling into the corpus.
    pub(crate) async fn ingest_file(&self, path: PathBuf) {
        if self.is_cancelled() {
            return;
        }
        self.read_into_corpus(&path).await;
        self.progress.file_processed();
    }

    async fn read_into_corpus(&self, path: &Path) {
        #[cfg(test)]
        if let Some(hook) = &self.read_hook {
            hook(path);
        }

        if !self.acc.claim(path) {
            tracing::info!(path = %path.display(), "Skipped duplicate");
            self.report.skip(path, SkipReason::Duplicate);
            return;
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.acc.release(path);
                tracing::warn!(path = %path.display(), error = %err, "Failed to read file");
                self.report.skip(
                    path,
                    SkipReason::Unreadable {
                        message: err.to_string(),
                    },
                );
                return;
            }
        };

        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => {
                self.acc.release(path);
                tracing::warn!(path = %path.display(), "Skipping file that is not valid UTF-8");
                self.report.skip(path, SkipReason::InvalidUtf8);
                return;
            }
        };

        let relative = relative_path(&self.base, path);
        self.acc
            .push(FileRecord::new(path.to_path_buf(), relative, content));
        self.report.ingested();
    }

    /// Collects the run's result. Every worker must have finished.
    pub(crate) async fn finish(&self) -> IngestOutcome {
        self.progress.finish().await;
        let completion = if self.cancel.is_cancelled() {
            Completion::Cancelled
        } else {
            Completion::Complete
        };
        let report = self.report.finish();
        tracing::debug!(
            files_found = report.files_found,
            files_ingested = report.files_ingested,
            skipped = report.skipped.len(),
            ?completion,
            "Ingestion finished"
        );
        IngestOutcome {
            corpus: self.acc.take_corpus(),
            report,
            completion,
        }
    }
}

/// Waits for every task in `tasks`, logging any that panicked.
pub(crate) async fn join_all(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "Ingestion task failed");
        }
    }
}
