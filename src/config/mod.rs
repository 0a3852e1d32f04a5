// src/config/mod.rs
//! Run configuration: one immutable struct, loaded once and handed to each
//! component at construction.
//!
//! Lookup order for the file:
//! 1) `$ZEITGEIST_CONFIG_PATH`
//! 2) `config/zeitgeist.toml`
//! 3) built-in defaults
//!
//! Environment overrides are applied after the file.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub const ENV_CONFIG_PATH: &str = "ZEITGEIST_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/zeitgeist.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub http: HttpConfig,
    pub openai: OpenAiConfig,
    pub kalshi: SourceConfig,
    pub polymarket: SourceConfig,
    pub classifier: ClassifierConfig,
    pub catalysts: CatalystsConfig,
    pub synthesis: SynthesisConfig,
    pub news: NewsConfig,
    pub fred: FredConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Smoke-test mode; defaults to `!is_prod`.
    pub quick_test: Option<bool>,
    pub output_dir: PathBuf,
    /// Set from `GITHUB_ACTIONS` at load time, never from the file.
    #[serde(skip)]
    pub is_prod: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            quick_test: None,
            output_dir: PathBuf::from(".reports"),
            is_prod: false,
        }
    }
}

impl RunConfig {
    pub fn quick_test(&self) -> bool {
        self.quick_test.unwrap_or(!self.is_prod)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: "zeitgeist/0.1".to_string(),
        }
    }
}

impl HttpConfig {
    /// Shared client for sources and enrichment; every call carries the timeout.
    pub fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .context("building http client")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// "ENV" means: read from OPENAI_API_KEY
    pub api_key: String,
    pub base_url: String,
    /// Per-call timeout; classification batches can be slow.
    pub timeout_secs: u64,
    /// First retry delay; doubles on each further attempt.
    pub backoff_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: "ENV".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 180,
            backoff_ms: 500,
        }
    }
}

impl OpenAiConfig {
    pub fn resolve_api_key(&self) -> Result<String> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow!("Missing OPENAI_API_KEY env var (add it to .env or export it)"))
        } else {
            Ok(self.api_key.clone())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    /// Falls back to the provider's public API root.
    pub base_url: Option<String>,
    pub page_size: usize,
    /// Whether quick-test runs may cut this source short.
    pub fast_exit: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            page_size: 100,
            fast_exit: true,
        }
    }
}

impl SourceConfig {
    /// Accumulated-count cutoff for this source, if any.
    pub fn page_limit(&self, quick_test: bool) -> Option<usize> {
        (quick_test && self.fast_exit).then_some(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model: String,
    pub batch_size: usize,
    /// Batch `i` is dispatched `i * stagger_ms` after the first.
    pub stagger_ms: u64,
    pub retries: u8,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: "gpt-5-mini-2025-08-07".to_string(),
            batch_size: 200,
            stagger_ms: 1_000,
            retries: 3,
        }
    }
}

impl ClassifierConfig {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalystsConfig {
    pub enabled: bool,
    pub model: String,
    pub retries: u8,
}

impl Default for CatalystsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-5.1-2025-11-13".to_string(),
            retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub model: String,
    pub retries: u8,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-2025-04-14".to_string(),
            retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub enabled: bool,
    pub url: String,
    pub max_items: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://news.google.com/rss?hl=en-US&gl=US&ceid=US:en".to_string(),
            max_items: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FredConfig {
    pub enabled: bool,
    /// "ENV" means: read from FRED_API_KEY (optional; no key, no section)
    pub api_key: String,
    pub base_url: String,
    pub series: Vec<String>,
    /// Most recent observations kept per series.
    pub observations: usize,
}

impl Default for FredConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: "ENV".to_string(),
            base_url: "https://api.stlouisfed.org/fred".to_string(),
            series: ["DFF", "DGS10", "T10Y2Y", "CPIAUCSL", "UNRATE", "VIXCLS"]
                .into_iter()
                .map(String::from)
                .collect(),
            observations: 5,
        }
    }
}

impl FredConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            env::var("FRED_API_KEY").ok().filter(|k| !k.trim().is_empty())
        } else if self.api_key.trim().is_empty() {
            None
        } else {
            Some(self.api_key.clone())
        }
    }
}

impl Config {
    /// Parse a TOML file, then apply environment overrides and validate.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: Config =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        cfg.finish()
    }

    /// Load using env var + fallbacks (see module docs).
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from_file(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        Config::default().finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.run.is_prod = env::var_os("GITHUB_ACTIONS").is_some();
        self.apply_env_overrides()?;
        self.validate()?;
        Ok(self)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = env::var("ZEITGEIST_QUICK_TEST") {
            self.run.quick_test = Some(parse_flag(&v));
        }
        if let Ok(v) = env::var("ZEITGEIST_OUTPUT_DIR") {
            self.run.output_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("ZEITGEIST_BATCH_SIZE") {
            self.classifier.batch_size = v
                .trim()
                .parse()
                .with_context(|| format!("ZEITGEIST_BATCH_SIZE={v} is not a number"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.is_prod && self.run.quick_test() {
            bail!("quick_test must be false in production (GITHUB_ACTIONS is set)");
        }
        if self.classifier.batch_size == 0 {
            bail!("classifier.batch_size must be > 0");
        }
        for (name, src) in [("kalshi", &self.kalshi), ("polymarket", &self.polymarket)] {
            if src.page_size == 0 {
                bail!("{name}.page_size must be > 0");
            }
        }
        Ok(())
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
