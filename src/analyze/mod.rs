// src/analyze/mod.rs
//! Classification stage: LLM adapter, batch classifier, and the merge back
//! onto the unified collection.

pub mod ai_adapter;
pub mod classify;
pub mod merge;
pub mod prompts;

// Re-export convenient types.
pub use crate::analyze::classify::{
    BatchClassifier, ClassificationResult, Classifier, ClassifyError, LlmClassifier,
};
pub use crate::analyze::merge::{classified_only, merge, MergedPrediction};
