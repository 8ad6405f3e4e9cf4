//! Path rules shared by the walker and manual ingestion.

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::Path;

/// Directory names pruned from every walk unless the caller overrides them.
pub const DEFAULT_EXCLUDED_DIR_NAMES: &[&str] =
    &["bin", "obj", "node_modules", "packages", ".git", ".vs"];

/// Path of `path` relative to `root`.
///
/// The prefix comparison ignores ASCII case and only matches on a component
/// boundary. Leading separators are trimmed from the remainder. A path outside
/// `root` is returned verbatim.
#[must_use]
pub fn relative_path(root: &Path, path: &Path) -> String {
    let root_str = root.to_string_lossy();
    let path_str = path.to_string_lossy();
    let root_str = root_str.trim_end_matches(['/', '\\']);

    let n = root_str.len();
    let prefix_matches = path_str.len() > n
        && path_str.is_char_boundary(n)
        && path_str.as_bytes()[..n].eq_ignore_ascii_case(root_str.as_bytes());

    if prefix_matches {
        let rest = &path_str[n..];
        if rest.starts_with(['/', '\\']) {
            return rest.trim_start_matches(['/', '\\']).to_string();
        }
    }
    path_str.into_owned()
}

/// Whether a directory named `name` should be skipped along with everything below it.
#[must_use]
pub fn is_excluded_dir_name(name: &str, excluded: &HashSet<String>) -> bool {
    name.starts_with('.') || excluded.contains(&name.to_lowercase())
}

/// Hidden or system attribute, where the platform has one.
#[cfg(windows)]
#[must_use]
pub fn is_hidden_or_system(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    metadata.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0
}

/// Hidden or system attribute, where the platform has one.
#[cfg(not(windows))]
#[must_use]
pub fn is_hidden_or_system(_metadata: &Metadata) -> bool {
    false
}
