// src/ingest/types.rs
use serde::{Deserialize, Serialize};

/// One outcome of a market: the question shown to traders and its implied probability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bet {
    pub prompt: String,
    pub probability: f64, // always within [0, 1]
}

impl Bet {
    /// Build a bet, rejecting probabilities outside [0, 1]. A blank prompt is
    /// kept; single-outcome markets often leave it empty.
    pub fn checked(prompt: &str, probability: f64) -> Option<Self> {
        let prompt = prompt.trim();
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return None;
        }
        Some(Self {
            prompt: prompt.to_string(),
            probability,
        })
    }

    /// Probability as `numerator / denominator` (e.g. last price over notional value).
    /// A zero or non-finite denominator marks the bet as malformed.
    pub fn from_ratio(prompt: &str, numerator: f64, denominator: f64) -> Option<Self> {
        if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
            return None;
        }
        Self::checked(prompt, numerator / denominator)
    }
}

/// Source-agnostic market record. `id` carries a source prefix (`kalshi-`, `pm-`)
/// so it stays unique across the unified collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedPrediction {
    pub id: String,
    pub title: String,
    pub bets: Vec<Bet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Prefix a raw source identifier. Returns `None` for blank identifiers.
pub fn prefixed_id(prefix: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        None
    } else {
        Some(format!("{prefix}-{raw}"))
    }
}

/// A fully-drained source. Implementations never fail: errors end pagination
/// early and whatever was accumulated is returned.
#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self) -> Vec<NormalizedPrediction>;
    fn name(&self) -> &'static str;
}
