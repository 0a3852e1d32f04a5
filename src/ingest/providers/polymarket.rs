// src/ingest/providers/polymarket.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::normalize_text;
use crate::ingest::paginate::{Page, PageCursor, PagedSource};
use crate::ingest::types::{prefixed_id, Bet, NormalizedPrediction};

pub const POLYMARKET_GAMMA_API: &str = "https://gamma-api.polymarket.com";

/// Gamma `/markets` record, decoded one at a time in `normalize`. `outcomes`
/// and `outcomePrices` arrive as JSON-encoded strings (`"[\"Yes\",\"No\"]"`),
/// occasionally as real arrays.
#[derive(Debug, Deserialize)]
struct GammaMarket {
    id: Option<Value>,
    question: Option<String>,
    slug: Option<String>,
    outcomes: Option<Value>,
    #[serde(rename = "outcomePrices")]
    outcome_prices: Option<Value>,
}

/// Offset-paginated source over active, unclosed Polymarket markets.
pub struct PolymarketProvider {
    base_url: String,
    page_size: usize,
    client: reqwest::Client,
}

impl PolymarketProvider {
    pub fn new(base_url: Option<&str>, page_size: usize, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(POLYMARKET_GAMMA_API)
                .trim_end_matches('/')
                .to_string(),
            page_size,
            client,
        }
    }

    /// Decode one `/markets` body fetched at `offset`. The next offset advances
    /// by the number of records on the page; an empty page ends pagination.
    pub fn parse_page(body: &str, offset: usize) -> Result<Page<Value>> {
        let records: Vec<Value> =
            serde_json::from_str(body).context("decoding polymarket markets page")?;
        let next = (!records.is_empty()).then(|| PageCursor::Offset(offset + records.len()));
        Ok(Page { records, next })
    }

    /// Map one raw market. Records that do not decode are skipped.
    pub fn normalize_market(record: Value) -> Option<NormalizedPrediction> {
        let market: GammaMarket = match serde_json::from_value(record) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable polymarket market");
                return None;
            }
        };
        let raw_id = match market.id? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let id = prefixed_id("pm", &raw_id)?;
        let title = normalize_text(market.question.as_deref()?);
        if title.is_empty() {
            return None;
        }

        // Unreadable outcomes fail the record; missing prices just mean no bets.
        let outcomes = json_list(market.outcomes.as_ref()?)?;
        let prices = match market.outcome_prices.as_ref() {
            Some(v) => json_list(v)?,
            None => Vec::new(),
        };

        let bets = outcomes
            .iter()
            .zip(prices.iter())
            .filter_map(|(prompt, price)| {
                let prompt = normalize_text(prompt.as_str()?);
                Bet::checked(&prompt, as_f64(price)?)
            })
            .collect();

        let url = market
            .slug
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("https://polymarket.com/market/{s}"));

        Some(NormalizedPrediction {
            id,
            title,
            bets,
            url,
        })
    }
}

fn json_list(v: &Value) -> Option<Vec<Value>> {
    match v {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => serde_json::from_str(s).ok(),
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl PagedSource for PolymarketProvider {
    type Record = Value;

    fn name(&self) -> &'static str {
        "polymarket"
    }

    fn first_cursor(&self) -> PageCursor {
        PageCursor::Offset(0)
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Page<Value>> {
        let offset = match cursor {
            PageCursor::Offset(o) => *o,
            _ => 0,
        };
        let body = self
            .client
            .get(format!("{}/markets", self.base_url))
            .query(&[
                ("active", "true".to_string()),
                ("closed", "false".to_string()),
                ("limit", self.page_size.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .context("polymarket GET /markets")?
            .error_for_status()
            .context("polymarket /markets status")?
            .text()
            .await
            .context("polymarket /markets body")?;
        Self::parse_page(&body, offset)
    }

    fn normalize(&self, record: Value) -> Option<NormalizedPrediction> {
        Self::normalize_market(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"[
        {"id": "512", "question": "Will BTC close above $100k in 2025?", "slug": "btc-100k",
         "outcomes": "[\"Yes\", \"No\"]", "outcomePrices": "[\"0.35\", \"0.65\"]"},
        {"id": 513, "question": "Recession in 2026?",
         "outcomes": ["Yes", "No"], "outcomePrices": [0.2, 0.8]},
        {"id": "514", "question": "No prices yet", "outcomes": "[\"Yes\", \"No\"]"},
        {"id": "515", "question": "Broken outcomes", "outcomes": "not json"},
        {"question": "No id"}
    ]"#;

    #[test]
    fn offset_advances_by_page_length() {
        let page = PolymarketProvider::parse_page(PAGE, 100).unwrap();
        assert_eq!(page.records.len(), 5);
        assert_eq!(page.next, Some(PageCursor::Offset(105)));

        let empty = PolymarketProvider::parse_page("[]", 105).unwrap();
        assert!(empty.next.is_none());
    }

    #[test]
    fn normalizes_string_encoded_and_native_lists() {
        let page = PolymarketProvider::parse_page(PAGE, 0).unwrap();
        let out: Vec<_> = page
            .records
            .into_iter()
            .filter_map(PolymarketProvider::normalize_market)
            .collect();

        let ids: Vec<_> = out.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["pm-512", "pm-513", "pm-514"]);

        assert_eq!(out[0].bets.len(), 2);
        assert_eq!(out[0].bets[1].prompt, "No");
        assert!((out[0].bets[1].probability - 0.65).abs() < 1e-12);
        assert_eq!(
            out[0].url.as_deref(),
            Some("https://polymarket.com/market/btc-100k")
        );

        assert_eq!(out[1].bets.len(), 2);
        assert!(out[2].bets.is_empty());
    }

    #[test]
    fn one_odd_market_does_not_sink_the_page() {
        let body = r#"[
            {"id": "1", "question": "First?", "outcomes": "[\"Yes\"]", "outcomePrices": "[\"0.4\"]"},
            {"id": "2", "question": {"text": "nested"}, "outcomes": "[\"Yes\"]"},
            null,
            {"id": "3", "question": "Third?", "outcomes": "[\"Yes\"]", "outcomePrices": "[\"0.6\"]"}
        ]"#;
        let page = PolymarketProvider::parse_page(body, 0).unwrap();
        assert_eq!(page.next, Some(PageCursor::Offset(4)));

        let ids: Vec<_> = page
            .records
            .into_iter()
            .filter_map(PolymarketProvider::normalize_market)
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["pm-1", "pm-3"]);
    }
}
