use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Call once, before the
    /// pipeline starts emitting.
    pub fn init() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!(
            "enrich_unavailable_total",
            "Enrichment sources that reported unavailable."
        );
        describe_histogram!("llm_call_ms", Unit::Milliseconds, "LLM call latency per attempt.");
        describe_counter!("llm_retries_total", "LLM attempts retried.");
        describe_counter!("llm_errors_total", "LLM calls that exhausted their retries.");
        describe_gauge!("ingest_source_size", "Predictions contributed by each source.");
        describe_gauge!("run_started_unix_seconds", "Start time of the current run.");

        gauge!("run_started_unix_seconds").set(chrono::Utc::now().timestamp() as f64);

        Ok(Self { handle })
    }

    /// Snapshot in the Prometheus exposition format; written next to the report.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
