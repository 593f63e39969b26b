//! OpenAI Chat Completions

use super::{compose_prompt, extract_fenced_block, status_error};
use super::{require_key, require_model, require_url};
use super::{LlmClient, TransformRequest};
use crate::config::{BackendKind, OpenAiConfig};
use crate::error::{BhError, BhResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    pre_prompt: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> BhResult<Self> {
        require_url("OpenAI", &config.base_url)?;
        require_key("OpenAI", &config.api_key)?;
        require_model("OpenAI", &config.model)?;
        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            pre_prompt: config.pre_prompt.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn send_text(&self, request: &TransformRequest) -> BhResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": compose_prompt(&self.pre_prompt, "\n", request),
            }],
            "max_tokens": self.max_tokens,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = status_error("OpenAI", response).await;
            warn!("❌ Error calling OpenAI API: {}", err);
            return Err(err);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| BhError::malformed("OpenAI", e.to_string()))?;
        debug!("OpenAI response: {}", json);

        let content = json
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| BhError::malformed("OpenAI", "missing choices[0].message.content"))?;

        Ok(extract_fenced_block(content.trim()))
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::OpenAi
    }
}
