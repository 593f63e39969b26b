//! Anthropic Messages API

use super::{compose_prompt, extract_fenced_block, require_key, require_url, status_error};
use super::{LlmClient, TransformRequest};
use crate::config::{BackendKind, ClaudeConfig};
use crate::error::{BhError, BhResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct ClaudeClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    pre_prompt: String,
    max_tokens: u32,
}

impl ClaudeClient {
    pub fn new(config: &ClaudeConfig) -> BhResult<Self> {
        require_url("Claude", &config.base_url)?;
        require_key("Claude", &config.api_key)?;
        validate_model(&config.model)?;
        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.trim().to_string(),
            pre_prompt: config.pre_prompt.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

fn validate_model(model: &str) -> BhResult<()> {
    let model = model.trim();
    if model.starts_with("claude-") && !model.contains(char::is_whitespace) {
        return Ok(());
    }
    Err(BhError::Config(
        "Invalid Claude model selected. Please check your settings.".to_string(),
    ))
}

/// Text of the first `text` content block
fn first_text_block(json: &Value) -> Option<&str> {
    json.get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))?
        .get("text")?
        .as_str()
}

#[async_trait]
impl LlmClient for ClaudeClient {
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
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = status_error("Claude", response).await;
            warn!("❌ Claude API call failed: {}", err);
            return Err(err);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| BhError::malformed("Claude", e.to_string()))?;
        debug!("Claude response: {}", json);

        let text = first_text_block(&json).ok_or_else(|| {
            BhError::malformed("Claude", "response did not contain a text content block")
        })?;
        Ok(extract_fenced_block(text))
    }

    fn name(&self) -> &str {
        "Anthropic Claude"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Claude
    }
}
