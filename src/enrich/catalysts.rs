// src/enrich/catalysts.rs
//! Forward-looking catalyst list produced by an LLM.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analyze::ai_adapter::{
    extract_json, list_schema, DynLlm, ItemList, OutputFormat, Prompt, RetryPolicy,
};
use crate::enrich::EnrichmentSource;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Catalyst {
    /// Title of the macro event or catalyst.
    pub event: String,
    /// A specific date or something looser like "2026 Q1" or "next month".
    pub when: String,
    /// Short phrases hinting at what it may move.
    #[serde(default)]
    pub impacts: Vec<String>,
}

pub struct CatalystAgent {
    llm: DynLlm,
    model: String,
    system: String,
    retry: RetryPolicy,
}

impl CatalystAgent {
    pub fn new(llm: DynLlm, model: impl Into<String>, system: String, retry: RetryPolicy) -> Self {
        Self {
            llm,
            model: model.into(),
            system,
            retry,
        }
    }

    fn prompt(&self) -> Prompt {
        Prompt {
            model: self.model.clone(),
            system: self.system.clone(),
            user: "List the upcoming catalysts.".to_string(),
            format: OutputFormat::Json {
                name: "upcoming_catalysts",
                schema: list_schema(json!({
                    "type": "object",
                    "properties": {
                        "event": { "type": "string" },
                        "when": { "type": "string" },
                        "impacts": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["event", "when", "impacts"],
                    "additionalProperties": false
                })),
            },
        }
    }
}

#[async_trait]
impl EnrichmentSource for CatalystAgent {
    type Item = Catalyst;

    fn name(&self) -> &'static str {
        "catalysts"
    }

    async fn try_fetch(&self) -> Result<Vec<Catalyst>> {
        let out: ItemList<Catalyst> =
            extract_json(self.llm.as_ref(), &self.prompt(), self.retry).await?;
        Ok(out
            .items
            .into_iter()
            .filter(|c| !c.event.trim().is_empty())
            .collect())
    }
}
