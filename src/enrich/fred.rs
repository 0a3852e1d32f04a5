// src/enrich/fred.rs
//! Macro time series from FRED (`series/observations`).

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::enrich::EnrichmentSource;

#[derive(Debug, Deserialize)]
struct ObservationsResp {
    #[serde(default)]
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String, // "." marks a missing value
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MacroObservation {
    pub series_id: String,
    pub date: String,
    pub value: f64,
}

pub struct FredProvider {
    base_url: String,
    api_key: Option<String>,
    series: Vec<String>,
    observations: usize,
    client: reqwest::Client,
}

impl FredProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        series: Vec<String>,
        observations: usize,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            series,
            observations,
            client,
        }
    }

    /// Newest-first observations for one series; missing values are dropped.
    pub fn parse_observations(series_id: &str, body: &str) -> Result<Vec<MacroObservation>> {
        let resp: ObservationsResp =
            serde_json::from_str(body).with_context(|| format!("decoding FRED {series_id}"))?;
        Ok(resp
            .observations
            .into_iter()
            .filter_map(|o| {
                let value = o.value.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
                Some(MacroObservation {
                    series_id: series_id.to_string(),
                    date: o.date,
                    value,
                })
            })
            .collect())
    }

    async fn fetch_series(&self, api_key: &str, series_id: &str) -> Result<Vec<MacroObservation>> {
        let limit = self.observations.to_string();
        let body = self
            .client
            .get(format!("{}/series/observations", self.base_url))
            .query(&[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("FRED GET {series_id}"))?
            .error_for_status()
            .with_context(|| format!("FRED {series_id} status"))?
            .text()
            .await?;
        Self::parse_observations(series_id, &body)
    }
}

#[async_trait]
impl EnrichmentSource for FredProvider {
    type Item = MacroObservation;

    fn name(&self) -> &'static str {
        "fred"
    }

    /// Series are fetched concurrently; one failing series is skipped, all
    /// failing makes the section unavailable.
    async fn try_fetch(&self) -> Result<Vec<MacroObservation>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no FRED api key configured"))?;
        if self.series.is_empty() {
            return Ok(Vec::new());
        }

        let results = futures::future::join_all(
            self.series.iter().map(|s| self.fetch_series(api_key, s)),
        )
        .await;

        let mut out = Vec::new();
        let mut failed = 0usize;
        for (series_id, res) in self.series.iter().zip(results) {
            match res {
                Ok(mut obs) => out.append(&mut obs),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(series = %series_id, error = ?e, "FRED series skipped");
                }
            }
        }
        if failed == self.series.len() {
            bail!("all {failed} FRED series failed");
        }
        Ok(out)
    }
}
