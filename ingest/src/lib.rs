//! Concurrent source-tree ingestion.
//!
//! Two entry points build a [`Corpus`](codecorpus_types::Corpus):
//!
//! - [`DirectoryWalker`] descends a project root, pruning excluded and hidden
//!   directories and applying the extension allow-list and size ceiling.
//! - [`ManualFileIngestor`] reads an explicit file list with a small fixed
//!   concurrency bound and no extension filter.
//!
//! Both deduplicate by absolute path through a shared [`CorpusAccumulator`], so
//! a manual selection merged into a previous walk never yields the same file
//! twice. Per-file problems are logged and recorded in the [`IngestReport`];
//! only an unusable root fails a call.

mod accumulator;
mod error;
mod manual;
mod paths;
mod progress;
mod report;
mod shared;
mod walker;

pub use accumulator::CorpusAccumulator;
pub use error::IngestError;
pub use manual::ManualFileIngestor;
pub use paths::{DEFAULT_EXCLUDED_DIR_NAMES, is_excluded_dir_name, relative_path};
pub use progress::{ProgressSink, ProgressSnapshot};
pub use report::{Completion, IngestOutcome, IngestReport, SkipReason, SkippedEntry};
pub use walker::{DirectoryWalker, WalkOptions};
