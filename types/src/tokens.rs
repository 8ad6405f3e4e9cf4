//! Token accounting results and model compatibility status.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// How the token counts in a result were obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMode {
    /// Every unit went through the sub-word encoder.
    #[default]
    Exact,
    /// No encoder was available; every unit used the character ratio.
    Heuristic,
    /// The encoder was available but at least one unit fell back to the ratio.
    Mixed,
}

impl EstimationMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Heuristic => "heuristic",
            Self::Mixed => "mixed",
        }
    }
}

/// Three-way classification of a token total against a model's context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ModelStatus {
    WithinLimit,
    ApproachingLimit,
    Exceeds,
}

impl ModelStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WithinLimit => "Within limit",
            Self::ApproachingLimit => "Approaching limit",
            Self::Exceeds => "Exceeds limit",
        }
    }
}

/// Classification of one model, with utilisation capped at 100%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelCompatibility {
    pub status: ModelStatus,
    pub percentage: f64,
    pub context_limit: u64,
}

impl fmt::Display for ModelCompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1}%)", self.status.label(), self.percentage)
    }
}

/// Raw per-unit counts handed to [`TokenCalculationResult::from_parts`].
#[derive(Debug, Clone, Default)]
pub struct TokenParts {
    pub prompt_template_tokens: u64,
    pub section_header_tokens: u64,
    /// One entry per file: (relative path, extension, tokens).
    pub files: Vec<(String, String, u64)>,
    pub buffer_percent: u32,
    pub mode: EstimationMode,
}

/// Token accounting for a corpus plus prompt template.
///
/// Always built wholesale through [`TokenCalculationResult::from_parts`], which
/// keeps `total = prompt + files + section headers + buffer` and
/// `sum(tokens_by_extension) = file_tokens`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenCalculationResult {
    total_tokens: u64,
    prompt_template_tokens: u64,
    file_tokens: u64,
    section_header_tokens: u64,
    buffer_tokens: u64,
    tokens_by_file: BTreeMap<String, u64>,
    tokens_by_extension: BTreeMap<String, u64>,
    model_compatibility: BTreeMap<String, ModelCompatibility>,
    mode: EstimationMode,
}

impl TokenCalculationResult {
    #[must_use]
    pub fn from_parts(parts: TokenParts) -> Self {
        let TokenParts {
            prompt_template_tokens,
            section_header_tokens,
            files,
            buffer_percent,
            mode,
        } = parts;

        let mut tokens_by_file: BTreeMap<String, u64> = BTreeMap::new();
        let mut tokens_by_extension: BTreeMap<String, u64> = BTreeMap::new();
        let mut file_tokens = 0u64;
        for (relative_path, extension, tokens) in files {
            file_tokens += tokens;
            *tokens_by_file.entry(relative_path).or_default() += tokens;
            *tokens_by_extension.entry(extension).or_default() += tokens;
        }

        let pre_buffer = prompt_template_tokens + section_header_tokens + file_tokens;
        let buffer_tokens = (pre_buffer * u64::from(buffer_percent)).div_ceil(100);

        Self {
            total_tokens: pre_buffer + buffer_tokens,
            prompt_template_tokens,
            file_tokens,
            section_header_tokens,
            buffer_tokens,
            tokens_by_file,
            tokens_by_extension,
            model_compatibility: BTreeMap::new(),
            mode,
        }
    }

    /// Returns a copy of this result carrying the given model classification.
    #[must_use]
    pub fn with_model_compatibility(
        mut self,
        compatibility: BTreeMap<String, ModelCompatibility>,
    ) -> Self {
        self.model_compatibility = compatibility;
        self
    }

    #[must_use]
    pub const fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    #[must_use]
    pub const fn prompt_template_tokens(&self) -> u64 {
        self.prompt_template_tokens
    }

    #[must_use]
    pub const fn file_tokens(&self) -> u64 {
        self.file_tokens
    }

    #[must_use]
    pub const fn section_header_tokens(&self) -> u64 {
        self.section_header_tokens
    }

    #[must_use]
    pub const fn buffer_tokens(&self) -> u64 {
        self.buffer_tokens
    }

    #[must_use]
    pub fn tokens_by_file(&self) -> &BTreeMap<String, u64> {
        &self.tokens_by_file
    }

    #[must_use]
    pub fn tokens_by_extension(&self) -> &BTreeMap<String, u64> {
        &self.tokens_by_extension
    }

    #[must_use]
    pub fn model_compatibility(&self) -> &BTreeMap<String, ModelCompatibility> {
        &self.model_compatibility
    }

    #[must_use]
    pub const fn mode(&self) -> EstimationMode {
        self.mode
    }
}
