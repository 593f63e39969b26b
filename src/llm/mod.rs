//! LLM Client Module
//!
//! A unified interface over the rewrite backends. Each client turns a
//! [`TransformRequest`] into the rewritten text or a [`BhError`] that says
//! what went wrong.

use crate::config::{BackendConfig, BackendKind};
use crate::error::{BhError, BhResult};
use crate::notify::Notifier;
use crate::store::StateStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub mod claude;
pub mod fence;
pub mod gateway;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use fence::extract_fenced_block;

/// How the selected text is turned into a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Backend pre-prompt followed by the text ("transform in place")
    #[default]
    Prefixed,
    /// The text is the prompt ("transform as free-form prompt")
    Direct,
}

/// One transformation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub text: String,
    pub mode: PromptMode,
}

impl TransformRequest {
    pub fn new(text: impl Into<String>, mode: PromptMode) -> Self {
        Self {
            text: text.into(),
            mode,
        }
    }
}

/// Trait for LLM backends
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the text and return the rewritten result
    async fn send_text(&self, request: &TransformRequest) -> BhResult<String>;

    /// Get the client name
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;
}

/// Build the prompt for `request`, joining pre-prompt and text with `separator`
pub fn compose_prompt(pre_prompt: &str, separator: &str, request: &TransformRequest) -> String {
    match request.mode {
        PromptMode::Prefixed if !pre_prompt.is_empty() => {
            format!("{}{}{}", pre_prompt, separator, request.text)
        }
        _ => request.text.clone(),
    }
}

pub(crate) fn require_url(backend: &str, url: &str) -> BhResult<reqwest::Url> {
    reqwest::Url::parse(url)
        .map_err(|e| BhError::Config(format!("Invalid {backend} API URL '{url}': {e}")))
}

pub(crate) fn require_key(backend: &str, key: &str) -> BhResult<()> {
    if key.trim().is_empty() {
        return Err(BhError::Config(format!(
            "No {backend} API key configured. Please check your settings."
        )));
    }
    Ok(())
}

pub(crate) fn require_model(backend: &str, model: &str) -> BhResult<()> {
    if model.trim().is_empty() {
        return Err(BhError::Config(format!(
            "No {backend} model selected. Please check your settings."
        )));
    }
    Ok(())
}

/// Build the JSON-over-HTTP status error, reading the body for the log
pub(crate) async fn status_error(backend: &str, response: reqwest::Response) -> BhError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    BhError::Status {
        backend: backend.to_string(),
        status,
        body,
    }
}

/// Factory to create the client for one backend
pub fn create_client(
    backend: &BackendConfig,
    store: Arc<StateStore>,
    notifier: Arc<dyn Notifier>,
) -> BhResult<Arc<dyn LlmClient>> {
    info!("🛠️ Creating LLM client: {}", backend.kind());
    let client: Arc<dyn LlmClient> = match backend {
        BackendConfig::Ollama(c) => Arc::new(ollama::OllamaClient::new(c)?),
        BackendConfig::Gateway(c) => Arc::new(gateway::GatewayClient::new(c, store, notifier)?),
        BackendConfig::OpenAi(c) => Arc::new(openai::OpenAiClient::new(c)?),
        BackendConfig::Claude(c) => Arc::new(claude::ClaudeClient::new(c)?),
        BackendConfig::Gemini(c) => Arc::new(gemini::GeminiClient::new(c)?),
    };
    info!("✅ LLM client '{}' initialized", client.name());
    Ok(client)
}
