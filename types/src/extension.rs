//! Extension normalisation shared by ingestion and estimation.
//!
//! Extensions are always stored lowercase with a leading dot (`.rs`). A file
//! without an extension maps to the empty string.

use std::path::Path;

/// Label used in section headers for files that have no extension.
const NO_EXTENSION_LABEL: &str = "OTHER";

/// Normalises a user-supplied extension (`"RS"`, `".Rs"`, `" .rs "`) to `.rs`.
#[must_use]
pub fn normalize_extension(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return String::new();
    }
    format!(".{}", trimmed.to_lowercase())
}

/// Returns the normalised extension of `path`, or `""` when it has none.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Display label for an extension group: `.py` becomes `PY`.
#[must_use]
pub fn extension_label(extension: &str) -> String {
    let bare = extension.trim_start_matches('.');
    if bare.is_empty() {
        NO_EXTENSION_LABEL.to_string()
    } else {
        bare.to_uppercase()
    }
}
