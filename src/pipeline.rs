// src/pipeline.rs
//! One daily run: ingest every source, classify, merge, gather enrichment,
//! and write the narrative.
//!
//! Classification and the enrichment sources run concurrently; the merge
//! waits for classification only.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::NaiveDate;
use thiserror::Error;

use crate::analyze::ai_adapter::{DynLlm, RetryPolicy};
use crate::analyze::{
    classified_only, merge, prompts, BatchClassifier, ClassifyError, LlmClassifier,
    MergedPrediction,
};
use crate::config::Config;
use crate::enrich::{
    Catalyst, CatalystAgent, Disabled, EnrichmentSource, FredProvider, Headline,
    MacroObservation, NewsRssProvider,
};
use crate::ingest::{aggregate_counted, Aggregated};
use crate::ingest::paginate::Paginated;
use crate::ingest::providers::kalshi::KalshiProvider;
use crate::ingest::providers::polymarket::PolymarketProvider;
use crate::ingest::types::SourceFetcher;
use crate::synth::{LlmSynthesizer, Synthesize, SynthesisInput};

/// Failures that abort the run. Everything else degrades in place.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Classification(#[from] ClassifyError),
    #[error("synthesis failed: {0:#}")]
    Synthesis(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Full left-joined collection, in ingestion order.
    pub merged: Vec<MergedPrediction>,
    /// Records that reached synthesis.
    pub relevant: usize,
    /// Records contributed by each source, in registration order.
    pub per_source: Vec<(&'static str, usize)>,
    /// Sections present in the synthesis input.
    pub sections: Vec<&'static str>,
    pub narrative: String,
}

pub struct Pipeline {
    pub sources: Vec<Box<dyn SourceFetcher>>,
    pub classifier: BatchClassifier,
    pub news: Box<dyn EnrichmentSource<Item = Headline>>,
    pub macro_series: Box<dyn EnrichmentSource<Item = MacroObservation>>,
    pub catalysts: Box<dyn EnrichmentSource<Item = Catalyst>>,
    pub synthesizer: Box<dyn Synthesize>,
}

impl Pipeline {
    /// Wire every component from config. Disabled sources are left out;
    /// disabled enrichment reports itself unavailable.
    pub fn from_config(cfg: &Config, llm: DynLlm, today: NaiveDate) -> Result<Self> {
        let http = cfg.http.client()?;
        let quick_test = cfg.run.quick_test();
        let backoff = Duration::from_millis(cfg.openai.backoff_ms);

        let mut sources: Vec<Box<dyn SourceFetcher>> = Vec::new();
        if cfg.kalshi.enabled {
            sources.push(Box::new(Paginated::new(
                KalshiProvider::new(
                    cfg.kalshi.base_url.as_deref(),
                    cfg.kalshi.page_size,
                    http.clone(),
                ),
                cfg.kalshi.page_limit(quick_test),
            )));
        }
        if cfg.polymarket.enabled {
            sources.push(Box::new(Paginated::new(
                PolymarketProvider::new(
                    cfg.polymarket.base_url.as_deref(),
                    cfg.polymarket.page_size,
                    http.clone(),
                ),
                cfg.polymarket.page_limit(quick_test),
            )));
        }
        if sources.is_empty() {
            tracing::warn!("every prediction source is disabled");
        }

        let classifier = BatchClassifier::new(
            Arc::new(LlmClassifier::new(
                llm.clone(),
                cfg.classifier.model.clone(),
                prompts::relevant_prediction(today),
                RetryPolicy::new(cfg.classifier.retries, backoff),
            )),
            cfg.classifier.batch_size,
            cfg.classifier.stagger(),
        );

        let news: Box<dyn EnrichmentSource<Item = Headline>> = if cfg.news.enabled {
            Box::new(NewsRssProvider::new(
                cfg.news.url.clone(),
                cfg.news.max_items,
                http.clone(),
            ))
        } else {
            Box::new(Disabled::<Headline>::new("news"))
        };

        let macro_series: Box<dyn EnrichmentSource<Item = MacroObservation>> = if cfg.fred.enabled
        {
            Box::new(FredProvider::new(
                &cfg.fred.base_url,
                cfg.fred.resolve_api_key(),
                cfg.fred.series.clone(),
                cfg.fred.observations,
                http,
            ))
        } else {
            Box::new(Disabled::<MacroObservation>::new("fred"))
        };

        let catalysts: Box<dyn EnrichmentSource<Item = Catalyst>> = if cfg.catalysts.enabled {
            Box::new(CatalystAgent::new(
                llm.clone(),
                cfg.catalysts.model.clone(),
                prompts::upcoming_catalysts(today),
                RetryPolicy::new(cfg.catalysts.retries, backoff),
            ))
        } else {
            Box::new(Disabled::<Catalyst>::new("catalysts"))
        };

        let synthesizer = Box::new(LlmSynthesizer::new(
            llm,
            cfg.synthesis.model.clone(),
            prompts::synthesis(today),
            RetryPolicy::new(cfg.synthesis.retries, backoff),
        ));

        tracing::info!(
            sources = sources.len(),
            quick_test,
            batch_size = cfg.classifier.batch_size,
            "pipeline configured"
        );

        Ok(Self {
            sources,
            classifier,
            news,
            macro_series,
            catalysts,
            synthesizer,
        })
    }

    pub async fn run(&self) -> std::result::Result<RunOutcome, PipelineError> {
        let started = Instant::now();

        let Aggregated {
            predictions: unified,
            per_source,
        } = aggregate_counted(&self.sources).await;

        let (classified, news, macro_series, catalysts) = tokio::join!(
            self.classifier.classify(&unified),
            self.news.fetch(),
            self.macro_series.fetch(),
            self.catalysts.fetch(),
        );
        let classified = classified?;

        let merged = merge(&unified, &classified);
        let relevant = classified_only(merged.clone());

        let input = SynthesisInput::build(&relevant, news, macro_series, catalysts);
        let sections = input.sections();
        let narrative = self
            .synthesizer
            .synthesize(&input)
            .await
            .map_err(PipelineError::Synthesis)?;

        tracing::info!(
            fetched = unified.len(),
            per_source = ?per_source,
            classified = classified.len(),
            relevant = relevant.len(),
            sections = ?sections,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run complete"
        );

        Ok(RunOutcome {
            merged,
            relevant: relevant.len(),
            per_source,
            sections,
            narrative,
        })
    }
}
