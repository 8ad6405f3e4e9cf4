use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Precondition failures that abort a whole ingestion call.
///
/// Problems with individual files or subdirectories never surface here; they
/// are logged and recorded in the [`IngestReport`](crate::IngestReport).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("root path does not exist: {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("root path is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),
    #[error("failed to access root path {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
