// src/synth.rs
//! Synthesis input document and the narrative writer behind it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::analyze::ai_adapter::{complete_with_retries, DynLlm, OutputFormat, Prompt, RetryPolicy};
use crate::analyze::MergedPrediction;
use crate::enrich::{Catalyst, Enrichment, Headline, MacroObservation};
use crate::ingest::types::Bet;

/// Compact view of a relevant market for the model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MarketDigest {
    pub title: String,
    pub bets: Vec<Bet>,
    pub topics: Vec<String>,
}

/// Everything the narrative is written from. Unavailable or empty enrichment
/// sections are `None` and left out of the document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SynthesisInput {
    pub prediction_markets: Vec<MarketDigest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news_headlines: Option<Vec<Headline>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macro_series: Option<Vec<MacroObservation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upcoming_catalysts: Option<Vec<Catalyst>>,
}

impl SynthesisInput {
    /// `relevant` should already be filtered to classified records; anything
    /// without topics is skipped here as well.
    pub fn build(
        relevant: &[MergedPrediction],
        news: Enrichment<Headline>,
        macro_series: Enrichment<MacroObservation>,
        catalysts: Enrichment<Catalyst>,
    ) -> Self {
        let prediction_markets = relevant
            .iter()
            .filter_map(|m| {
                Some(MarketDigest {
                    title: m.prediction.title.clone(),
                    bets: m.prediction.bets.clone(),
                    topics: m.topics.clone()?,
                })
            })
            .collect();
        Self {
            prediction_markets,
            news_headlines: news.into_section(),
            macro_series: macro_series.into_section(),
            upcoming_catalysts: catalysts.into_section(),
        }
    }

    /// Section names present in the document, for the run summary.
    pub fn sections(&self) -> Vec<&'static str> {
        let mut out = vec!["prediction_markets"];
        if self.news_headlines.is_some() {
            out.push("news_headlines");
        }
        if self.macro_series.is_some() {
            out.push("macro_series");
        }
        if self.upcoming_catalysts.is_some() {
            out.push("upcoming_catalysts");
        }
        out
    }

    pub fn to_xml(&self) -> Result<String> {
        quick_xml::se::to_string_with_root("report_input", self)
            .context("serializing synthesis input")
    }
}

/// Narrative-generation capability.
#[async_trait]
pub trait Synthesize: Send + Sync {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<String>;
}

pub struct LlmSynthesizer {
    llm: DynLlm,
    model: String,
    system: String,
    retry: RetryPolicy,
}

impl LlmSynthesizer {
    pub fn new(llm: DynLlm, model: impl Into<String>, system: String, retry: RetryPolicy) -> Self {
        Self {
            llm,
            model: model.into(),
            system,
            retry,
        }
    }
}

#[async_trait]
impl Synthesize for LlmSynthesizer {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<String> {
        let prompt = Prompt {
            model: self.model.clone(),
            system: self.system.clone(),
            user: input.to_xml()?,
            format: OutputFormat::Text,
        };
        tracing::info!(
            model = %self.model,
            markets = input.prediction_markets.len(),
            bytes = prompt.user.len(),
            "synthesizing report"
        );
        complete_with_retries(self.llm.as_ref(), &prompt, self.retry).await
    }
}
