// src/analyze/classify.rs
//! # Batch classifier
//! Splits the unified collection into fixed-size batches, dispatches them on
//! a staggered schedule (batch `i` starts `i * stagger` after the first), and
//! concatenates per-batch tags in batch order.
//!
//! A failed or empty batch contributes nothing and never aborts its siblings.
//! Only when batches were dispatched and *none* produced a result is the run
//! considered unclassifiable.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::analyze::ai_adapter::{
    extract_json, list_schema, DynLlm, ItemList, OutputFormat, Prompt, RetryPolicy,
};
use crate::ingest::types::{Bet, NormalizedPrediction};

/// Topics assigned to one prediction id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationResult {
    pub id: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error(
        "classification produced no results ({failed} of {batches} batches failed, the rest came back empty)"
    )]
    NothingClassified { batches: usize, failed: usize },
}

/// One external classification call for one batch (retries included).
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify_batch(&self, batch: &[NormalizedPrediction])
        -> Result<Vec<ClassificationResult>>;
    fn name(&self) -> &'static str;
}

/// Consecutive, order-preserving batches; the last may be short.
pub fn partition<T>(items: &[T], batch_size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(batch_size.max(1))
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("classify_batches_total", "Batches dispatched.");
        describe_counter!(
            "classify_batch_failures_total",
            "Batches that failed after retries."
        );
        describe_counter!(
            "classify_results_total",
            "Classification results collected."
        );
    });
}

pub struct BatchClassifier {
    classifier: Arc<dyn Classifier>,
    batch_size: usize,
    stagger: Duration,
}

impl BatchClassifier {
    pub fn new(classifier: Arc<dyn Classifier>, batch_size: usize, stagger: Duration) -> Self {
        Self {
            classifier,
            batch_size: batch_size.max(1),
            stagger,
        }
    }

    pub async fn classify(
        &self,
        unified: &[NormalizedPrediction],
    ) -> std::result::Result<Vec<ClassificationResult>, ClassifyError> {
        ensure_metrics_described();

        let batches: Vec<&[NormalizedPrediction]> = partition(unified, self.batch_size).collect();
        if batches.is_empty() {
            tracing::warn!("nothing to classify");
            return Ok(Vec::new());
        }

        let start = tokio::time::Instant::now();
        let n = batches.len();
        tracing::info!(
            batches = n,
            batch_size = self.batch_size,
            items = unified.len(),
            classifier = self.classifier.name(),
            "dispatching classification batches"
        );

        let calls = batches.iter().enumerate().map(|(i, batch)| {
            let at = start + self.stagger.saturating_mul(i as u32);
            async move {
                tokio::time::sleep_until(at).await;
                tracing::debug!(batch = i, size = batch.len(), "classifying batch");
                counter!("classify_batches_total").increment(1);
                (i, self.classifier.classify_batch(batch).await)
            }
        });
        // join_all yields in input order, i.e. batch order.
        let outcomes = futures::future::join_all(calls).await;

        let mut results = Vec::new();
        let mut failed = 0usize;
        for (i, outcome) in outcomes {
            match outcome {
                Ok(mut tagged) => {
                    if tagged.is_empty() {
                        tracing::warn!(batch = i, "batch returned no classifications");
                    }
                    tracing::debug!(batch = i, tagged = tagged.len(), "batch done");
                    results.append(&mut tagged);
                }
                Err(e) => {
                    failed += 1;
                    counter!("classify_batch_failures_total").increment(1);
                    tracing::warn!(batch = i, error = ?e, "batch failed, skipping");
                }
            }
        }

        counter!("classify_results_total").increment(results.len() as u64);
        if results.is_empty() {
            tracing::error!(batches = n, failed, "no batch produced a classification");
            return Err(ClassifyError::NothingClassified { batches: n, failed });
        }

        tracing::info!(
            picked = results.len(),
            from = unified.len(),
            failed_batches = failed,
            "picked relevant predictions"
        );
        Ok(results)
    }
}

/// Wire shape of one submitted market: `{id, title, bets}` in input order.
#[derive(Serialize)]
struct BatchItem<'a> {
    id: &'a str,
    title: &'a str,
    bets: &'a [Bet],
}

/// Classifier backed by an LLM with structured (JSON schema) output.
pub struct LlmClassifier {
    llm: DynLlm,
    model: String,
    system: String,
    retry: RetryPolicy,
}

impl LlmClassifier {
    pub fn new(llm: DynLlm, model: impl Into<String>, system: String, retry: RetryPolicy) -> Self {
        Self {
            llm,
            model: model.into(),
            system,
            retry,
        }
    }

    fn schema() -> serde_json::Value {
        list_schema(json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "original id from input" },
                "topics": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "public companies or investment sectors or broad alternatives impacted"
                }
            },
            "required": ["id", "topics"],
            "additionalProperties": false
        }))
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify_batch(
        &self,
        batch: &[NormalizedPrediction],
    ) -> Result<Vec<ClassificationResult>> {
        let items: Vec<BatchItem<'_>> = batch
            .iter()
            .map(|p| BatchItem {
                id: &p.id,
                title: &p.title,
                bets: &p.bets,
            })
            .collect();
        let prompt = Prompt {
            model: self.model.clone(),
            system: self.system.clone(),
            user: serde_json::to_string(&items)?,
            format: OutputFormat::Json {
                name: "tagged_predictions",
                schema: Self::schema(),
            },
        };
        let out: ItemList<ClassificationResult> =
            extract_json(self.llm.as_ref(), &prompt, self.retry).await?;
        Ok(out.items)
    }

    fn name(&self) -> &'static str {
        self.llm.provider_name()
    }
}
