//! Google Gemini generateContent

use super::{compose_prompt, extract_fenced_block, status_error};
use super::{require_key, require_model, require_url};
use super::{LlmClient, TransformRequest};
use crate::config::{BackendKind, GeminiConfig};
use crate::error::{BhError, BhResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    pre_prompt: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> BhResult<Self> {
        require_url("Gemini", &config.base_url)?;
        require_key("Gemini", &config.api_key)?;
        require_model("Gemini", &config.model)?;
        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.trim().to_string(),
            pre_prompt: config.pre_prompt.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn send_text(&self, request: &TransformRequest) -> BhResult<String> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": compose_prompt(&self.pre_prompt, " ", request) }]
            }]
        });
        debug!("GeminiClient: sending request to model {}", self.model);

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = status_error("Gemini", response).await;
            warn!("❌ Error calling Gemini API: {}", err);
            return Err(err);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| BhError::malformed("Gemini", e.to_string()))?;

        let text = json
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| BhError::malformed("Gemini", "response text is missing"))?;
        debug!("GeminiClient: output: {}", text);

        Ok(extract_fenced_block(text.trim()))
    }

    fn name(&self) -> &str {
        "Google Gemini"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Gemini
    }
}
