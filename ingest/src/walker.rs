//! Recursive, concurrency-bounded directory walk.
//!
//! Every file is read on its own runtime task; subdirectories get their own
//! tasks while `depth <= parallel_depth_threshold` and are walked one after
//! another below that, which keeps fan-out flat in deep trees. A single
//! semaphore caps the number of file reads in flight across the whole walk.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codecorpus_types::{Corpus, extension_of, normalize_extension};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::accumulator::CorpusAccumulator;
use crate::error::IngestError;
use crate::paths::{DEFAULT_EXCLUDED_DIR_NAMES, is_excluded_dir_name, is_hidden_or_system};
use crate::progress::ProgressSink;
use crate::report::{IngestOutcome, SkipReason};
use crate::shared::{IngestShared, join_all};

/// Filters and concurrency policy for a [`DirectoryWalker`].
#[derive(Debug, Clone)]
pub struct WalkOptions {
    allowed_extensions: HashSet<String>,
    max_file_size_kb: u64,
    excluded_dir_names: HashSet<String>,
    parallel_depth_threshold: usize,
    parallelism: usize,
}

impl WalkOptions {
    pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 1024;
    pub const DEFAULT_PARALLEL_DEPTH_THRESHOLD: usize = 3;

    /// Half the logical CPUs, at least one.
    #[must_use]
    pub fn default_parallelism() -> usize {
        let cpus = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        (cpus / 2).max(1)
    }

    /// Only files with these extensions are ingested. An empty set allows every extension.
    #[must_use]
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_max_file_size_kb(mut self, kb: u64) -> Self {
        self.max_file_size_kb = kb;
        self
    }

    /// Replaces the excluded directory names. Dot-prefixed names are always excluded.
    #[must_use]
    pub fn with_excluded_dir_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_dir_names = names
            .into_iter()
            .map(|name| name.as_ref().to_lowercase())
            .collect();
        self
    }

    #[must_use]
    pub fn with_parallel_depth_threshold(mut self, depth: usize) -> Self {
        self.parallel_depth_threshold = depth;
        self
    }

    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    #[must_use]
    pub fn max_file_size_kb(&self) -> u64 {
        self.max_file_size_kb
    }

    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    #[must_use]
    pub fn parallel_depth_threshold(&self) -> usize {
        self.parallel_depth_threshold
    }

    fn allows(&self, path: &Path) -> bool {
        self.allowed_extensions.is_empty() || self.allowed_extensions.contains(&extension_of(path))
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            allowed_extensions: HashSet::new(),
            max_file_size_kb: Self::DEFAULT_MAX_FILE_SIZE_KB,
            excluded_dir_names: DEFAULT_EXCLUDED_DIR_NAMES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            parallel_depth_threshold: Self::DEFAULT_PARALLEL_DEPTH_THRESHOLD,
            parallelism: Self::default_parallelism(),
        }
    }
}

/// Walks a project tree into a [`Corpus`].
///
/// # Example
///
/// ```no_run
/// # async fn run() -> Result<(), codecorpus_ingest::IngestError> {
/// use codecorpus_ingest::{DirectoryWalker, WalkOptions};
///
/// let options = WalkOptions::default().with_allowed_extensions([".rs", ".toml"]);
/// let outcome = DirectoryWalker::new(options).walk("./my-project").await?;
/// println!("{} files", outcome.corpus.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DirectoryWalker {
    options: WalkOptions,
    progress: Option<ProgressSink>,
    cancel: CancellationToken,
}

impl DirectoryWalker {
    #[must_use]
    pub fn new(options: WalkOptions) -> Self {
        Self {
            options,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Stops scheduling new directories and files once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    pub async fn walk(&self, root: impl AsRef<Path>) -> Result<IngestOutcome, IngestError> {
        self.walk_into(root, Corpus::new()).await
    }

    /// Walks `root` and merges the result into `existing`.
    ///
    /// Paths already in `existing` are skipped as duplicates.
    ///
    /// # Errors
    ///
    /// Fails only if `root` is missing, not a directory, or cannot be resolved.
    pub async fn walk_into(
        &self,
        root: impl AsRef<Path>,
        existing: Corpus,
    ) -> Result<IngestOutcome, IngestError> {
        let root = resolve_root(root.as_ref()).await?;
        let shared = self.shared_for(&root, existing);
        Ok(self.run(root, shared).await)
    }

    fn shared_for(&self, root: &Path, existing: Corpus) -> IngestShared {
        IngestShared::new(
            CorpusAccumulator::from_corpus(existing),
            root.to_path_buf(),
            self.options.max_file_size_kb,
            self.progress.clone(),
            self.cancel.clone(),
        )
    }

    async fn run(&self, root: PathBuf, shared: IngestShared) -> IngestOutcome {
        tracing::debug!(
            root = %root.display(),
            parallelism = self.options.parallelism,
            depth_threshold = self.options.parallel_depth_threshold,
            "Starting directory walk"
        );
        let walk = Arc::new(Walk {
            shared,
            options: self.options.clone(),
            reads: Arc::new(Semaphore::new(self.options.parallelism)),
        });
        Arc::clone(&walk).dir(root, 0).await;
        walk.shared.finish().await
    }
}

async fn resolve_root(root: &Path) -> Result<PathBuf, IngestError> {
    let metadata = match tokio::fs::metadata(root).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(IngestError::RootNotFound(root.to_path_buf()));
        }
        Err(source) => {
            return Err(IngestError::RootUnreadable {
                path: root.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.is_dir() {
        return Err(IngestError::RootNotDirectory(root.to_path_buf()));
    }
    tokio::fs::canonicalize(root)
        .await
        .map_err(|source| IngestError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })
}

/// State shared by every task of one walk.
struct Walk {
    shared: IngestShared,
    options: WalkOptions,
    /// Caps file reads in flight across the whole tree.
    reads: Arc<Semaphore>,
}

/// What one directory listing yielded after filtering.
#[derive(Default)]
struct Listing {
    files: Vec<PathBuf>,
    subdirs: Vec<PathBuf>,
}

impl Walk {
    /// Visits `dir`: spawns a task per file, then descends into subdirectories.
    ///
    /// Subdirectories at `depth <= parallel_depth_threshold` are spawned as
    /// their own tasks, at most `parallelism` at a time; deeper ones are
    /// walked one after another on the current task. Directory tasks hold no
    /// read permits, so nested fan-out cannot starve file reads.
    fn dir(self: Arc<Self>, dir: PathBuf, depth: usize) -> BoxFuture<'static, ()> {
        async move {
            if self.shared.is_cancelled() {
                return;
            }
            let Some(listing) = self.list(&dir).await else {
                return;
            };

            let mut files = JoinSet::new();
            for path in listing.files {
                if self.shared.is_cancelled() {
                    break;
                }
                let Ok(permit) = Arc::clone(&self.reads).acquire_owned().await else {
                    break;
                };
                let walk = Arc::clone(&self);
                files.spawn(async move {
                    walk.shared.ingest_file(path).await;
                    drop(permit);
                });
            }

            if depth <= self.options.parallel_depth_threshold {
                let mut subdirs = JoinSet::new();
                for subdir in listing.subdirs {
                    if self.shared.is_cancelled() {
                        break;
                    }
                    if subdirs.len() >= self.options.parallelism
                        && let Some(Err(err)) = subdirs.join_next().await
                    {
                        tracing::error!(error = %err, "Directory task failed");
                    }
                    subdirs.spawn(Arc::clone(&self).dir(subdir, depth + 1));
                }
                join_all(&mut subdirs).await;
            } else {
                for subdir in listing.subdirs {
                    if self.shared.is_cancelled() {
                        break;
                    }
                    Arc::clone(&self).dir(subdir, depth + 1).await;
                }
            }

            join_all(&mut files).await;
        }
        .boxed()
    }

    /// Lists `dir`, applying the exclusion, extension and size rules.
    ///
    /// Returns `None` if the directory itself could not be read.
    async fn list(&self, dir: &Path) -> Option<Listing> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) => {
                self.directory_unreadable(dir, &err);
                return None;
            }
        };

        let mut listing = Listing::default();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    self.directory_unreadable(dir, &err);
                    break;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(err) => {
                    self.entry_unreadable(&path, &err);
                    continue;
                }
            };

            if file_type.is_dir() {
                let name = entry.file_name();
                if is_excluded_dir_name(&name.to_string_lossy(), &self.options.excluded_dir_names) {
                    tracing::trace!(path = %path.display(), "Pruned excluded directory");
                    continue;
                }
                if let Ok(metadata) = entry.metadata().await
                    && is_hidden_or_system(&metadata)
                {
                    tracing::trace!(path = %path.display(), "Pruned hidden directory");
                    continue;
                }
                listing.subdirs.push(path);
                continue;
            }

            if !self.options.allows(&path) {
                continue;
            }

            // Symlinked files are followed; symlinked directories are not descended.
            let metadata = if file_type.is_symlink() {
                tokio::fs::metadata(&path).await
            } else {
                entry.metadata().await
            };
            let metadata = match metadata {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(err) => {
                    self.entry_unreadable(&path, &err);
                    continue;
                }
            };

            let size = metadata.len();
            if self.shared.exceeds_limit(size) {
                tracing::debug!(path = %path.display(), size_bytes = size, "Skipping file over size limit");
                self.shared.skip_too_large(&path, size);
                continue;
            }
            self.shared.found();
            listing.files.push(path);
        }
        Some(listing)
    }

    fn entry_unreadable(&self, path: &Path, err: &io::Error) {
        tracing::warn!(path = %path.display(), error = %err, "Failed to inspect entry");
        self.shared.skip(
            path,
            SkipReason::Unreadable {
                message: err.to_string(),
            },
        );
    }

    fn directory_unreadable(&self, dir: &Path, err: &io::Error) {
        tracing::warn!(path = %dir.display(), error = %err, "Failed to read directory");
        self.shared.skip(
            dir,
            SkipReason::DirectoryUnreadable {
                message: err.to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use codecorpus_types::Corpus;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    use super::{DirectoryWalker, Walk, WalkOptions, resolve_root};
    use crate::report::{IngestOutcome, SkipReason};
    use crate::shared::test_support::InFlightGauge;

    fn tree(dirs: usize, files: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..files {
            let sub = dir.path().join(format!("pkg{}", i % dirs));
            fs::create_dir_all(&sub).unwrap();
            fs::write(sub.join(format!("m{i}.py")), "x").unwrap();
        }
        dir
    }

    async fn walk_with_gauge(
        walker: &DirectoryWalker,
        root: &Path,
        gauge: &Arc<InFlightGauge>,
    ) -> IngestOutcome {
        let root = resolve_root(root).await.unwrap();
        let mut shared = walker.shared_for(&root, Corpus::new());
        shared.set_read_hook(gauge.hook(Duration::from_millis(5)));
        walker.run(root, shared).await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn file_reads_run_in_parallel_up_to_the_bound() {
        let dir = tree(8, 80);
        let walker = DirectoryWalker::new(
            WalkOptions::default()
                .with_allowed_extensions([".py"])
                .with_parallelism(4),
        );
        let gauge = Arc::new(InFlightGauge::default());

        let outcome = walk_with_gauge(&walker, dir.path(), &gauge).await;

        assert_eq!(outcome.corpus.len(), 80);
        assert_eq!(gauge.total(), 80);
        assert!(gauge.peak() > 1, "reads never overlapped");
        assert!(gauge.peak() <= 4, "peak {} exceeds parallelism", gauge.peak());
    }

    #[tokio::test]
    async fn uninspectable_entry_is_reported_unreadable() {
        let walker = DirectoryWalker::new(WalkOptions::default());
        let walk = Walk {
            shared: walker.shared_for(Path::new("/repo"), Corpus::new()),
            options: WalkOptions::default(),
            reads: Arc::new(Semaphore::new(1)),
        };

        walk.entry_unreadable(
            Path::new("/repo/x.py"),
            &io::Error::from(io::ErrorKind::PermissionDenied),
        );
        let outcome = walk.shared.finish().await;

        assert_eq!(outcome.report.skipped.len(), 1);
        assert_eq!(outcome.report.skipped[0].path, Path::new("/repo/x.py"));
        assert!(matches!(
            outcome.report.skipped[0].reason,
            SkipReason::Unreadable { .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallelism_of_one_serialises_reads() {
        let dir = tree(4, 20);
        let walker = DirectoryWalker::new(WalkOptions::default().with_parallelism(1));
        let gauge = Arc::new(InFlightGauge::default());

        let outcome = walk_with_gauge(&walker, dir.path(), &gauge).await;

        assert_eq!(outcome.corpus.len(), 20);
        assert_eq!(gauge.peak(), 1);
    }

    #[test]
    fn defaults() {
        let options = WalkOptions::default();
        assert_eq!(options.max_file_size_kb(), 1024);
        assert_eq!(options.parallel_depth_threshold(), 3);
        assert!(options.parallelism() >= 1);
        assert!(options.excluded_dir_names.contains("node_modules"));
    }

    #[test]
    fn allow_list_is_case_insensitive() {
        let options = WalkOptions::default().with_allowed_extensions(["PY", ".Rs"]);
        assert!(options.allows(Path::new("/r/a.py")));
        assert!(options.allows(Path::new("/r/B.PY")));
        assert!(options.allows(Path::new("/r/lib.rs")));
        assert!(!options.allows(Path::new("/r/notes.md")));
        assert!(!options.allows(Path::new("/r/Makefile")));
    }

    #[test]
    fn empty_allow_list_allows_everything() {
        let options = WalkOptions::default();
        assert!(options.allows(Path::new("/r/Makefile")));
        assert!(options.allows(Path::new("/r/a.anything")));
    }

    #[test]
    fn parallelism_is_at_least_one() {
        assert_eq!(WalkOptions::default().with_parallelism(0).parallelism(), 1);
        assert!(WalkOptions::default_parallelism() >= 1);
    }

    #[test]
    fn excluded_names_are_lowercased() {
        let options = WalkOptions::default().with_excluded_dir_names(["Vendor"]);
        assert!(options.excluded_dir_names.contains("vendor"));
        assert!(!options.excluded_dir_names.contains("node_modules"));
    }
}
