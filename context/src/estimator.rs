//! Corpus + prompt template -> [`TokenCalculationResult`].

use std::collections::HashSet;

use codecorpus_types::{Corpus, EstimationMode, FileRecord, TokenCalculationResult, TokenParts};

use crate::language::language_for_extension;
use crate::token_counter::{HeuristicCounter, TokenCounter, UnitCount};
use crate::units::{FILE_FOOTER, file_header, section_header};

/// Tunables for [`TokenEstimator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorOptions {
    /// Heuristic ratio used when a unit is not encoded exactly.
    pub tokens_per_char: f64,
    /// Structural overhead added on top of the counted units, in percent.
    pub buffer_percent: u32,
    /// Whether to load the sub-word encoder at all.
    pub use_encoder: bool,
}

impl EstimatorOptions {
    pub const DEFAULT_BUFFER_PERCENT: u32 = 5;
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            tokens_per_char: HeuristicCounter::DEFAULT_TOKENS_PER_CHAR,
            buffer_percent: Self::DEFAULT_BUFFER_PERCENT,
            use_encoder: true,
        }
    }
}

/// Tallies how many units were counted exactly vs. by heuristic.
#[derive(Debug, Default)]
struct ModeTally {
    exact: usize,
    fallback: usize,
}

impl ModeTally {
    fn add(&mut self, unit: UnitCount) -> u64 {
        if unit.exact {
            self.exact += 1;
        } else {
            self.fallback += 1;
        }
        unit.tokens
    }

    fn mode(&self, encoder_available: bool) -> EstimationMode {
        if !encoder_available {
            EstimationMode::Heuristic
        } else if self.fallback > 0 {
            EstimationMode::Mixed
        } else {
            EstimationMode::Exact
        }
    }
}

/// Computes token budgets for a corpus and prompt template.
///
/// Each unit of text (the prompt template, one section header per extension,
/// and per file a header, the content, and a footer) is counted on its own and
/// summed. A unit the encoder cannot handle is counted heuristically without
/// affecting the rest. The result is recomputed from scratch on every call.
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    counter: TokenCounter,
    buffer_percent: u32,
}

impl TokenEstimator {
    #[must_use]
    pub fn new(options: EstimatorOptions) -> Self {
        let heuristic = HeuristicCounter::new(options.tokens_per_char);
        let counter = if options.use_encoder {
            TokenCounter::new(heuristic)
        } else {
            TokenCounter::heuristic_only(heuristic)
        };
        Self::with_counter(counter, options.buffer_percent)
    }

    #[must_use]
    pub fn with_counter(counter: TokenCounter, buffer_percent: u32) -> Self {
        Self {
            counter,
            buffer_percent: buffer_percent.min(100),
        }
    }

    #[must_use]
    pub fn encoder_available(&self) -> bool {
        self.counter.has_encoder()
    }

    #[must_use]
    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    #[must_use]
    pub fn estimate(&self, corpus: &Corpus, prompt_template: &str) -> TokenCalculationResult {
        let mut tally = ModeTally::default();

        let prompt_template_tokens = tally.add(self.counter.count_unit(prompt_template));

        let mut section_header_tokens = 0u64;
        let mut files = Vec::with_capacity(corpus.len());
        let mut keys = HashSet::with_capacity(corpus.len());
        for (extension, records) in corpus.iter() {
            if records.is_empty() {
                continue;
            }
            section_header_tokens += tally.add(self.counter.count_unit(&section_header(extension)));

            let language = language_for_extension(extension);
            for record in records {
                let header = file_header(record.relative_path(), language);
                let tokens = tally.add(self.counter.count_unit(&header))
                    + tally.add(self.counter.count_unit(record.content()))
                    + tally.add(self.counter.count_unit(FILE_FOOTER));
                files.push((file_key(record, &mut keys), extension.to_string(), tokens));
            }
        }

        let mode = tally.mode(self.counter.has_encoder());
        tracing::debug!(
            files = files.len(),
            exact_units = tally.exact,
            fallback_units = tally.fallback,
            mode = mode.as_str(),
            "Token estimate computed"
        );

        TokenCalculationResult::from_parts(TokenParts {
            prompt_template_tokens,
            section_header_tokens,
            files,
            buffer_percent: self.buffer_percent,
            mode,
        })
    }
}

/// Per-file key: the relative path, or the absolute path when two records
/// share one (files ingested against different bases).
fn file_key(record: &FileRecord, keys: &mut HashSet<String>) -> String {
    let relative = record.relative_path();
    if keys.insert(relative.to_string()) {
        return relative.to_string();
    }
    let absolute = record.absolute_path().display().to_string();
    tracing::warn!(
        relative_path = relative,
        absolute_path = %absolute,
        "Relative path collision; keying per-file tokens by absolute path"
    );
    keys.insert(absolute.clone());
    absolute
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(EstimatorOptions::default())
    }
}
