//! Daily digest entrypoint: load config, run the pipeline once, write the
//! report and a metrics snapshot, exit.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zeitgeist::ai_adapter::build_client_from_config;
use zeitgeist::metrics::Metrics;
use zeitgeist::{report, Config, Pipeline};

/// JSON logs when `LOG_FORMAT=json` or in CI; compact otherwise.
fn init_tracing(is_prod: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zeitgeist=info,warn"));

    let json = is_prod
        || std::env::var("LOG_FORMAT")
            .ok()
            .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();

    init_tracing(std::env::var_os("GITHUB_ACTIONS").is_some());

    let cfg = Config::load_default().context("loading config")?;
    let metrics = Metrics::init()?;
    let llm = build_client_from_config(&cfg.openai)?;
    let today = chrono::Local::now().date_naive();

    tracing::info!(
        %today,
        quick_test = cfg.run.quick_test(),
        provider = llm.provider_name(),
        "starting daily run"
    );

    let pipeline = Pipeline::from_config(&cfg, llm, today)?;
    let outcome = pipeline.run().await.context("daily run aborted")?;

    let html = report::render_html(today, &outcome.narrative);
    let path = report::write_report(&cfg.run.output_dir, today, &html)?;
    report::write_sidecar(&cfg.run.output_dir, today, "metrics.prom", &metrics.render())?;

    tracing::info!(
        path = %path.display(),
        relevant = outcome.relevant,
        total = outcome.merged.len(),
        "report written"
    );
    Ok(())
}
