//! Core domain types for codecorpus.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Ingestion produces a [`Corpus`] of [`FileRecord`]s; estimation turns a corpus plus a
//! prompt template into a [`TokenCalculationResult`].

mod corpus;
mod extension;
mod tokens;

pub use corpus::{Corpus, DuplicatePathError, FileRecord};
pub use extension::{extension_label, extension_of, normalize_extension};
pub use tokens::{
    EstimationMode, ModelCompatibility, ModelStatus, TokenCalculationResult, TokenParts,
};
