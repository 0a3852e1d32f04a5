// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod enrich;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod synth;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use crate::config::Config;
pub use crate::pipeline::{Pipeline, PipelineError, RunOutcome};
