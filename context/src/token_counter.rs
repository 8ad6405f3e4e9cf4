//! Token counting using tiktoken, with a character-ratio fallback.
//!
//! Exact counts use the `cl100k_base` encoding from tiktoken. It matches the
//! GPT-4 family and serves as a cross-vendor proxy for the others:
//!
//! - **Claude models**: Anthropic uses a proprietary tokenizer; counts may vary
//! - **Gemini models**: Google uses a proprietary tokenizer; counts may vary
//!
//! When no encoder is available, or the encoder fails on a particular unit of
//! text, that unit is counted as `ceil(chars * tokens_per_char)` instead. The
//! default ratio of 0.25 is an empirical figure for English-leaning source code
//! and prose, not a claim of accuracy.

use std::fmt;
use std::sync::{Arc, OnceLock};

use thiserror::Error;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// The tiktoken encoder is expensive to initialize (loads vocabulary data),
/// so we create it once and reuse it across all `TiktokenEncoder` instances.
static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn get_encoder() -> Option<&'static CoreBPE> {
    ENCODER.get_or_init(|| cl100k_base().ok()).as_ref()
}

/// A tokenizer failed on one unit of text.
#[derive(Debug, Clone, Error)]
#[error("{encoder} failed to encode unit: {message}")]
pub struct EncodingError {
    pub encoder: &'static str,
    pub message: String,
}

/// Sub-word encoder that reports how many tokens a piece of text costs.
pub trait TokenEncoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn count(&self, text: &str) -> Result<u64, EncodingError>;
}

/// Shared `cl100k_base` encoder.
#[derive(Clone, Copy)]
pub struct TiktokenEncoder {
    bpe: &'static CoreBPE,
}

impl fmt::Debug for TiktokenEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiktokenEncoder")
            .field("bpe", &"<CoreBPE cl100k_base>")
            .finish()
    }
}

impl TiktokenEncoder {
    /// Returns the process-wide encoder, or `None` if the vocabulary failed to load.
    #[must_use]
    pub fn cl100k() -> Option<Self> {
        let encoder = get_encoder().map(|bpe| Self { bpe });
        if encoder.is_none() {
            tracing::error!(
                "Failed to initialize tiktoken cl100k_base encoder. Falling back to character-ratio estimates."
            );
        }
        encoder
    }
}

impl TokenEncoder for TiktokenEncoder {
    fn name(&self) -> &'static str {
        "cl100k_base"
    }

    fn count(&self, text: &str) -> Result<u64, EncodingError> {
        Ok(self.bpe.encode_ordinary(text).len() as u64)
    }
}

/// `ceil(chars * tokens_per_char)` estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicCounter {
    tokens_per_char: f64,
}

impl HeuristicCounter {
    pub const DEFAULT_TOKENS_PER_CHAR: f64 = 0.25;

    /// Non-finite or non-positive ratios fall back to the default.
    #[must_use]
    pub fn new(tokens_per_char: f64) -> Self {
        let tokens_per_char = if tokens_per_char.is_finite() && tokens_per_char > 0.0 {
            tokens_per_char
        } else {
            Self::DEFAULT_TOKENS_PER_CHAR
        };
        Self { tokens_per_char }
    }

    #[must_use]
    pub const fn tokens_per_char(&self) -> f64 {
        self.tokens_per_char
    }

    #[must_use]
    pub fn count(&self, text: &str) -> u64 {
        let chars = text.chars().count();
        if chars == 0 {
            return 0;
        }
        (chars as f64 * self.tokens_per_char).ceil() as u64
    }
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TOKENS_PER_CHAR)
    }
}

/// Token count for one unit, and whether the encoder produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitCount {
    pub tokens: u64,
    pub exact: bool,
}

/// Thread-safe token counter: encoder first, heuristic per unit on failure.
#[derive(Clone)]
pub struct TokenCounter {
    encoder: Option<Arc<dyn TokenEncoder>>,
    heuristic: HeuristicCounter,
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoder", &self.encoder.as_ref().map(|e| e.name()))
            .field("heuristic", &self.heuristic)
            .finish()
    }
}

impl TokenCounter {
    /// Counter backed by tiktoken when it loads, heuristic otherwise.
    #[must_use]
    pub fn new(heuristic: HeuristicCounter) -> Self {
        let encoder = TiktokenEncoder::cl100k().map(|e| Arc::new(e) as Arc<dyn TokenEncoder>);
        Self { encoder, heuristic }
    }

    /// Counter that never consults an encoder.
    #[must_use]
    pub fn heuristic_only(heuristic: HeuristicCounter) -> Self {
        Self {
            encoder: None,
            heuristic,
        }
    }

    #[must_use]
    pub fn with_encoder(encoder: Arc<dyn TokenEncoder>, heuristic: HeuristicCounter) -> Self {
        Self {
            encoder: Some(encoder),
            heuristic,
        }
    }

    #[must_use]
    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }

    #[must_use]
    pub fn count_unit(&self, text: &str) -> UnitCount {
        if let Some(encoder) = &self.encoder {
            match encoder.count(text) {
                Ok(tokens) => return UnitCount { tokens, exact: true },
                Err(err) => {
                    tracing::debug!(
                        error = %err,
                        bytes = text.len(),
                        "Encoding failed; using heuristic for this unit"
                    );
                }
            }
        }
        UnitCount {
            tokens: self.heuristic.count(text),
            exact: false,
        }
    }

    #[must_use]
    pub fn count_str(&self, text: &str) -> u64 {
        self.count_unit(text).tokens
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new(HeuristicCounter::default())
    }
}
