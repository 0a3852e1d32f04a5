// src/enrich/mod.rs
//! Optional context for the synthesis stage. Each source swallows its own
//! failures and reports [`Enrichment::Unavailable`] instead; synthesis treats
//! that exactly like an empty section.

pub mod catalysts;
pub mod fred;
pub mod news_rss;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;

pub use catalysts::{Catalyst, CatalystAgent};
pub use fred::{FredProvider, MacroObservation};
pub use news_rss::{Headline, NewsRssProvider};

#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment<T> {
    Available(Vec<T>),
    Unavailable,
}

impl<T> Enrichment<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Enrichment::Available(_))
    }

    /// `None` for unavailable *and* empty sections; both are omitted downstream.
    pub fn into_section(self) -> Option<Vec<T>> {
        match self {
            Enrichment::Available(v) if !v.is_empty() => Some(v),
            _ => None,
        }
    }
}

#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    type Item: Send;

    fn name(&self) -> &'static str;
    async fn try_fetch(&self) -> Result<Vec<Self::Item>>;

    /// Never fails: errors are logged and become `Unavailable`.
    async fn fetch(&self) -> Enrichment<Self::Item> {
        match self.try_fetch().await {
            Ok(items) => {
                tracing::info!(source = self.name(), count = items.len(), "enrichment fetched");
                Enrichment::Available(items)
            }
            Err(e) => {
                tracing::warn!(source = self.name(), error = ?e, "enrichment unavailable");
                counter!("enrich_unavailable_total", "source" => self.name()).increment(1);
                Enrichment::Unavailable
            }
        }
    }
}

/// Stand-in for a source switched off in config; reported like any other
/// unavailable section.
pub struct Disabled<T> {
    name: &'static str,
    _item: std::marker::PhantomData<fn() -> T>,
}

impl<T> Disabled<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            _item: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> EnrichmentSource for Disabled<T> {
    type Item = T;

    fn name(&self) -> &'static str {
        self.name
    }

    async fn try_fetch(&self) -> Result<Vec<T>> {
        anyhow::bail!("{} disabled in config", self.name)
    }
}
