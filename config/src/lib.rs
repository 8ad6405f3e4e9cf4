//! Settings provider for codecorpus.
//!
//! Settings live in `~/.codecorpus/config.toml`. Every section and key is
//! optional; a missing file means all defaults.
//!
//! ```toml
//! [scan]
//! allowed_extensions = [".rs", ".py"]
//! max_file_size_kb = 1024
//! excluded_dir_names = ["bin", "obj", "node_modules", "packages", ".git", ".vs"]
//!
//! [prompt]
//! template_file = "${HOME}/prompts/review.txt"
//!
//! [tokens]
//! tokens_per_char = 0.25
//! buffer_percent = 5
//! approaching_threshold = 0.9
//!
//! [models]
//! "local-llama" = 32768
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// File the error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => {
                Some(path.as_path())
            }
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Extensions scanned when the config does not name any.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    ".c", ".cc", ".cpp", ".cs", ".css", ".go", ".h", ".hpp", ".html", ".java", ".js", ".json",
    ".jsx", ".kt", ".md", ".php", ".py", ".rb", ".rs", ".scss", ".sh", ".sql", ".swift", ".toml",
    ".ts", ".tsx", ".txt", ".xml", ".yaml", ".yml",
];

/// Directory names pruned from every walk.
pub const DEFAULT_EXCLUDED_DIR_NAMES: &[&str] =
    &["bin", "obj", "node_modules", "packages", ".git", ".vs"];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

/// `[scan]`: what the walker visits and how hard it works.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub allowed_extensions: Vec<String>,
    pub max_file_size_kb: u64,
    pub excluded_dir_names: Vec<String>,
    /// Subdirectories at depth `<=` this are walked in parallel.
    pub parallel_depth_threshold: usize,
    /// Concurrent reads for manually selected files.
    pub manual_concurrency: usize,
    pub progress_interval_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: strings(DEFAULT_ALLOWED_EXTENSIONS),
            max_file_size_kb: 1024,
            excluded_dir_names: strings(DEFAULT_EXCLUDED_DIR_NAMES),
            parallel_depth_threshold: 3,
            manual_concurrency: 10,
            progress_interval_ms: 500,
        }
    }
}

/// `[prompt]`: the template sent ahead of the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub template: Option<String>,
    /// Path to a template file. `${VAR}` references are expanded.
    pub template_file: Option<String>,
}

/// `[tokens]`: estimation constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TokensConfig {
    pub tokens_per_char: f64,
    pub buffer_percent: u32,
    pub approaching_threshold: f64,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            tokens_per_char: 0.25,
            buffer_percent: 5,
            approaching_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub scan: ScanConfig,
    pub prompt: PromptConfig,
    pub tokens: TokensConfig,
    /// Extra or overriding context limits, keyed by model name.
    pub models: BTreeMap<String, u64>,
}

/// Expand `${VAR}` references. Unset variables expand to the empty string.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(pos) = rest.find("${") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[pos..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".codecorpus").join("config.toml"))
}

impl CorpusConfig {
    /// Loads `~/.codecorpus/config.toml`, or defaults if there is none.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads and validates the file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let config: Self = match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tokens = &self.tokens;
        if !(tokens.tokens_per_char.is_finite() && tokens.tokens_per_char > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "tokens.tokens_per_char must be positive, got {}",
                tokens.tokens_per_char
            )));
        }
        if tokens.buffer_percent > 100 {
            return Err(ConfigError::Invalid(format!(
                "tokens.buffer_percent must be at most 100, got {}",
                tokens.buffer_percent
            )));
        }
        if !(tokens.approaching_threshold > 0.0 && tokens.approaching_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "tokens.approaching_threshold must be in (0, 1], got {}",
                tokens.approaching_threshold
            )));
        }
        if self.scan.manual_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "scan.manual_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The active prompt template: `template_file` if set, else `template`, else empty.
    pub fn prompt_template(&self) -> Result<String, ConfigError> {
        if let Some(file) = &self.prompt.template_file {
            let path = PathBuf::from(expand_env_vars(file));
            return fs::read_to_string(&path).map_err(|source| {
                tracing::warn!("Failed to read prompt template at {:?}: {}", path, source);
                ConfigError::Read { path, source }
            });
        }
        Ok(self.prompt.template.clone().unwrap_or_default())
    }
}
