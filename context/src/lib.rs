//! Token budget accounting for an ingested corpus.
//!
//! This crate provides:
//! - Sub-word token counting via tiktoken (`cl100k_base`) with a character-ratio fallback
//! - The synthetic text units (section headers, file fences) that are counted per file
//! - Per-file, per-extension, and aggregate token breakdowns with a structural buffer
//! - A table of model context limits and a classifier against it
//!
//! # Architecture
//!
//! ```text
//! TokenEstimator
//! ├── counter: TokenCounter
//! │   ├── encoder: Option<dyn TokenEncoder> (tiktoken cl100k_base)
//! │   └── heuristic: HeuristicCounter (ceil(chars * ratio))
//! └── buffer_percent
//!
//! ModelCompatibilityClassifier + ModelLimitTable
//! └── TokenCalculationResult -> { model -> ModelCompatibility }
//! ```

mod classifier;
mod estimator;
mod language;
mod model_limits;
mod token_counter;
mod units;

pub use classifier::ModelCompatibilityClassifier;
pub use estimator::{EstimatorOptions, TokenEstimator};
pub use language::language_for_extension;
pub use model_limits::{ModelLimitSource, ModelLimitTable, ResolvedModelLimit};
pub use token_counter::{
    EncodingError, HeuristicCounter, TiktokenEncoder, TokenCounter, TokenEncoder, UnitCount,
};
pub use units::{FILE_FOOTER, file_header, section_header};
