// src/ingest/mod.rs
pub mod paginate;
pub mod providers;
pub mod types;

use crate::ingest::types::{NormalizedPrediction, SourceFetcher};
use metrics::{describe_counter, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

/// One-time metrics registration (so series show up in the snapshot).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_pages_total", "Pages fetched per source.");
        describe_counter!(
            "ingest_records_total",
            "Normalized predictions kept per source."
        );
        describe_counter!(
            "ingest_skipped_total",
            "Raw records skipped as malformed (missing id/title)."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Page fetch/decode errors that ended a source early."
        );
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 500 chars
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }

    out
}

/// Unified collection plus how much each source contributed, in
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct Aggregated {
    pub predictions: Vec<NormalizedPrediction>,
    pub per_source: Vec<(&'static str, usize)>,
}

/// Drain every source concurrently and concatenate in registration order.
///
/// A source that failed contributes whatever it collected (possibly nothing);
/// this never fails. Completion order does not affect the output order.
pub async fn aggregate(sources: &[Box<dyn SourceFetcher>]) -> Vec<NormalizedPrediction> {
    aggregate_counted(sources).await.predictions
}

/// [`aggregate`], keeping the per-source counts for the run summary.
pub async fn aggregate_counted(sources: &[Box<dyn SourceFetcher>]) -> Aggregated {
    ensure_metrics_described();

    let drained = futures::future::join_all(sources.iter().map(|s| s.fetch())).await;

    let mut unified = Vec::with_capacity(drained.iter().map(Vec::len).sum());
    let mut per_source = Vec::with_capacity(sources.len());
    for (source, mut predictions) in sources.iter().zip(drained) {
        if predictions.is_empty() {
            tracing::warn!(source = source.name(), "source contributed nothing");
        }
        gauge!("ingest_source_size", "source" => source.name()).set(predictions.len() as f64);
        per_source.push((source.name(), predictions.len()));
        unified.append(&mut predictions);
    }

    let mut seen = HashSet::with_capacity(unified.len());
    let dups = unified.iter().filter(|p| !seen.insert(p.id.as_str())).count();
    if dups > 0 {
        tracing::warn!(duplicates = dups, "duplicate ids in unified collection");
    }

    tracing::info!(total = unified.len(), per_source = ?per_source, "aggregated predictions");
    Aggregated {
        predictions: unified,
        per_source,
    }
}
