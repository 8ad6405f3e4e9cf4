//! Synthetic text units fed to the tokenizer alongside file contents.
//!
//! These must stay byte-for-byte stable: they model the framing a prompt
//! assembler wraps around each extension group and each file.

use codecorpus_types::extension_label;

/// Closing fence appended after every file's content.
pub const FILE_FOOTER: &str = "\n```\n";

/// `--- PY FILES ---\n\n` for the `.py` group.
#[must_use]
pub fn section_header(extension: &str) -> String {
    format!("--- {} FILES ---\n\n", extension_label(extension))
}

/// `File: src/main.rs\n```rust\n`.
#[must_use]
pub fn file_header(relative_path: &str, language: &str) -> String {
    format!("File: {relative_path}\n```{language}\n")
}
