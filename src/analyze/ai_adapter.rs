//! AI adapter: provider abstraction, OpenAI chat-completions provider, a
//! deterministic mock, and the retry loop every LLM stage goes through.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::OpenAiConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// What the model is asked to return.
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Text,
    /// Strict JSON schema; `name` identifies the shape (used by the mock too).
    Json { name: &'static str, schema: Value },
}

/// One fully-rendered model call.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub model: String,
    pub system: String,
    pub user: String,
    pub format: OutputFormat,
}

/// Trait object used by the classifier, catalyst lookahead and synthesizer.
/// One call = one attempt; retries live in [`complete_with_retries`].
pub trait LlmClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: &'a Prompt,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynLlm = Arc<dyn LlmClient>;

/// Retry budget shared by every stage.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u8,
    /// Delay before the first retry; doubles each time.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u8, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    fn delay(&self, attempt: u8) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Factory: build a client according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns the deterministic mock client.
/// * Else builds the OpenAI provider; a missing API key is an error.
pub fn build_client_from_config(config: &OpenAiConfig) -> Result<DynLlm> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        tracing::warn!("AI_TEST_MODE=mock: using deterministic mock LLM");
        return Ok(Arc::new(MockProvider));
    }
    let api_key = config.resolve_api_key()?;
    Ok(Arc::new(OpenAiProvider::new(api_key, config)?))
}

/// Call the model, retrying on any error with exponential backoff.
pub async fn complete_with_retries(
    llm: &dyn LlmClient,
    prompt: &Prompt,
    policy: RetryPolicy,
) -> Result<String> {
    with_retries(llm, prompt, policy, |s| Ok(s)).await
}

/// Call the model and decode its JSON answer; unparsable answers are retried too.
pub async fn extract_json<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    prompt: &Prompt,
    policy: RetryPolicy,
) -> Result<T> {
    with_retries(llm, prompt, policy, |s| {
        serde_json::from_str::<T>(strip_code_fence(&s)).context("decoding model JSON output")
    })
    .await
}

async fn with_retries<T>(
    llm: &dyn LlmClient,
    prompt: &Prompt,
    policy: RetryPolicy,
    parse: impl Fn(String) -> Result<T>,
) -> Result<T> {
    let mut attempt: u8 = 0;
    loop {
        let t0 = Instant::now();
        let res = llm.complete(prompt).await.and_then(&parse);
        histogram!("llm_call_ms", "model" => prompt.model.clone())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);

        match res {
            Ok(v) => return Ok(v),
            Err(e) if attempt < policy.retries => {
                counter!("llm_retries_total", "provider" => llm.provider_name()).increment(1);
                tracing::warn!(
                    provider = llm.provider_name(),
                    model = %prompt.model,
                    attempt = attempt + 1,
                    error = ?e,
                    "llm call failed, retrying"
                );
                tokio::time::sleep(policy.delay(attempt)).await;
                attempt += 1;
            }
            Err(e) => {
                counter!("llm_errors_total", "provider" => llm.provider_name()).increment(1);
                return Err(e.context(format!(
                    "{} call to {} failed after {} attempts",
                    llm.provider_name(),
                    prompt.model,
                    u32::from(attempt) + 1
                )));
            }
        }
    }
}

/// Models sometimes wrap JSON in ```json fences despite the schema.
fn strip_code_fence(s: &str) -> &str {
    let t = s.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Wrap an item schema into the object envelope strict mode requires:
/// `{"items": [<item>...]}`.
pub fn list_schema(item: Value) -> Value {
    json!({
        "type": "object",
        "properties": { "items": { "type": "array", "items": item } },
        "required": ["items"],
        "additionalProperties": false
    })
}

/// Decoded form of [`list_schema`] answers.
#[derive(Debug, Deserialize)]
pub struct ItemList<T> {
    pub items: Vec<T>,
}

// ------------------------------------------------------------
// Concrete providers
// ------------------------------------------------------------

/// OpenAI provider (Chat Completions API).
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, config: &OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("zeitgeist/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building openai http client")?;
        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

impl LlmClient for OpenAiProvider {
    fn complete<'a>(
        &'a self,
        prompt: &'a Prompt,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let response_format = match &prompt.format {
                OutputFormat::Text => None,
                OutputFormat::Json { name, schema } => Some(json!({
                    "type": "json_schema",
                    "json_schema": { "name": name, "strict": true, "schema": schema }
                })),
            };
            // Reasoning models reject a temperature parameter.
            let temperature = if prompt.model.starts_with("gpt-5") {
                None
            } else {
                Some(0.2)
            };
            let req = ChatReq {
                model: &prompt.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: &prompt.system,
                    },
                    Msg {
                        role: "user",
                        content: &prompt.user,
                    },
                ],
                temperature,
                response_format,
            };

            let resp = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .context("openai request")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                return Err(anyhow!("OpenAI API error ({status}): {text}"));
            }
            let body: ChatResp = resp.json().await.context("decoding openai response")?;
            body.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| anyhow!("OpenAI returned no content"))
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic offline provider. Tags every submitted id with `["mock"]`,
/// returns no catalysts, and a fixed narrative.
#[derive(Clone, Default)]
pub struct MockProvider;

impl LlmClient for MockProvider {
    fn complete<'a>(
        &'a self,
        prompt: &'a Prompt,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            match &prompt.format {
                OutputFormat::Text => Ok("Mock synthesis: nothing to see here.".to_string()),
                OutputFormat::Json { name, .. } if *name == "tagged_predictions" => {
                    let input: Vec<Value> =
                        serde_json::from_str(&prompt.user).context("mock: batch is not JSON")?;
                    let items: Vec<Value> = input
                        .iter()
                        .filter_map(|v| v.get("id").cloned())
                        .map(|id| json!({ "id": id, "topics": ["mock"] }))
                        .collect();
                    Ok(json!({ "items": items }).to_string())
                }
                OutputFormat::Json { .. } => Ok(json!({ "items": [] }).to_string()),
            }
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
