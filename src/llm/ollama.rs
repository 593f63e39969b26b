//! Ollama Local Inference
//!
//! Sends the selection to a local Ollama server through `/api/generate`.

use super::{compose_prompt, extract_fenced_block, require_model, require_url, status_error};
use super::{LlmClient, TransformRequest};
use crate::config::{BackendKind, OllamaConfig};
use crate::error::{BhError, BhResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that always rewrites given text in a professional yet conversational tone, correcting any grammatical errors, and provides the rewritten text enclosed in Markdown code blocks using the following format. I will give you the text to rewrite, and you will give the rewritten text. No prompts, or asks:\n```markdown\nRewritten text goes here, nothing else. Just the rewritten text for the given text.\n```";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    system: &'a str,
    stream: bool,
}

/// Ollama API response
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub model: String,
    pub created_at: String,
    pub response: String,
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub context: Vec<i64>,
}

/// Client for a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    pre_prompt: String,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> BhResult<Self> {
        require_url("Ollama", &config.url)?;
        require_model("Ollama", &config.model)?;
        Ok(Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            pre_prompt: config.pre_prompt.clone(),
        })
    }

    /// Health check - verify Ollama is reachable
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn send_text(&self, request: &TransformRequest) -> BhResult<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: compose_prompt(&self.pre_prompt, ": ", request),
            system: SYSTEM_PROMPT,
            stream: false,
        };
        debug!("🧠 Ollama request for model {}", self.model);

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = status_error("Ollama", response).await;
            warn!("❌ Ollama API Error: {}", err);
            return Err(err);
        }

        let body_text = response.text().await?;
        debug!("🧠 Ollama raw body: {}", body_text);

        let parsed: GenerateResponse = serde_json::from_str(&body_text).map_err(|e| {
            warn!("❌ Failed to deserialize Ollama response: {}", e);
            BhError::malformed("Ollama", e.to_string())
        })?;

        Ok(extract_fenced_block(&parsed.response))
    }

    fn name(&self) -> &str {
        "Local Ollama"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }
}
