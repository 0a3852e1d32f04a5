// src/ingest/providers/kalshi.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::normalize_text;
use crate::ingest::paginate::{Page, PageCursor, PagedSource};
use crate::ingest::types::{prefixed_id, Bet, NormalizedPrediction};

pub const KALSHI_API_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";

/// Events stay raw JSON until `normalize`, so a single odd record is
/// skipped instead of failing the whole page.
#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    events: Option<Vec<Value>>,
    cursor: Option<String>,
}

/// One `/events` record with nested markets.
#[derive(Debug, Deserialize)]
struct KalshiEvent {
    event_ticker: Option<String>,
    series_ticker: Option<String>,
    title: Option<String>,
    markets: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct KalshiMarket {
    yes_sub_title: Option<String>,
    last_price: Option<f64>,
    notional_value: Option<f64>,
}

/// Cursor-paginated source over open Kalshi events.
pub struct KalshiProvider {
    base_url: String,
    page_size: usize,
    client: reqwest::Client,
}

impl KalshiProvider {
    pub fn new(base_url: Option<&str>, page_size: usize, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(KALSHI_API_URL)
                .trim_end_matches('/')
                .to_string(),
            page_size,
            client,
        }
    }

    /// Decode one `/events` response body. An empty or missing cursor ends pagination.
    pub fn parse_page(body: &str) -> Result<Page<Value>> {
        let page: EventsPage = serde_json::from_str(body).context("decoding kalshi events page")?;
        let next = page
            .cursor
            .filter(|c| !c.trim().is_empty())
            .map(PageCursor::Token);
        Ok(Page {
            records: page.events.unwrap_or_default(),
            next,
        })
    }

    /// Map one raw event to a prediction. An undecodable event is skipped;
    /// undecodable markets and markets with zero notional value drop their bet.
    pub fn normalize_event(record: Value) -> Option<NormalizedPrediction> {
        let event: KalshiEvent = match serde_json::from_value(record) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable kalshi event");
                return None;
            }
        };
        let id = prefixed_id("kalshi", event.event_ticker.as_deref()?)?;
        let title = normalize_text(event.title.as_deref()?);
        if title.is_empty() {
            return None;
        }

        let bets = event
            .markets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| {
                let m: KalshiMarket = serde_json::from_value(raw).ok()?;
                let prompt = normalize_text(m.yes_sub_title.as_deref().unwrap_or_default());
                let bet = Bet::from_ratio(&prompt, m.last_price?, m.notional_value?);
                if bet.is_none() {
                    tracing::debug!(event = %id, prompt = %prompt, "skipping malformed kalshi market");
                }
                bet
            })
            .collect();

        let url = event
            .series_ticker
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("https://kalshi.com/markets/{}", s.to_ascii_lowercase()));

        Some(NormalizedPrediction {
            id,
            title,
            bets,
            url,
        })
    }
}

#[async_trait]
impl PagedSource for KalshiProvider {
    type Record = Value;

    fn name(&self) -> &'static str {
        "kalshi"
    }

    fn first_cursor(&self) -> PageCursor {
        PageCursor::Start
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Page<Value>> {
        let limit = self.page_size.to_string();
        let mut req = self
            .client
            .get(format!("{}/events", self.base_url))
            .query(&[
                ("status", "open"),
                ("with_nested_markets", "true"),
                ("limit", limit.as_str()),
            ]);
        if let PageCursor::Token(token) = cursor {
            req = req.query(&[("cursor", token.as_str())]);
        }

        let body = req
            .send()
            .await
            .context("kalshi GET /events")?
            .error_for_status()
            .context("kalshi /events status")?
            .text()
            .await
            .context("kalshi /events body")?;
        Self::parse_page(&body)
    }

    fn normalize(&self, record: Value) -> Option<NormalizedPrediction> {
        Self::normalize_event(record)
    }
}
