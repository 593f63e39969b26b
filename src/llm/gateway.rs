//! Authenticated Gateway Client
//!
//! The gateway needs an IAM ticket on every call. The stored ticket is used
//! optimistically; a 401/403 triggers a password sign-in and the call is
//! re-issued with the fresh ticket. At most [`MAX_ATTEMPTS`] completion calls
//! are made per transformation.

use super::{compose_prompt, extract_fenced_block, require_model, require_url, status_error};
use super::{LlmClient, TransformRequest};
use crate::config::{BackendKind, GatewayConfig};
use crate::error::{BhError, BhResult};
use crate::notify::Notifier;
use crate::store::{StateStore, CREDENTIAL_KEY};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Completion calls allowed per transformation, the original one included
pub const MAX_ATTEMPTS: u32 = 3;

const AUTH_SCHEME: &str = "Intuit_IAM_Authentication";
const SIGN_IN_OPERATION: &str = "identityTestSignInWithPassword";
const SIGN_IN_MUTATION: &str = r#"mutation identityTestSignInWithPassword($input: Identity_TestSignInWithPasswordInput!) {
    identityTestSignInWithPassword(input: $input) {
        accessToken
        legacyAuthId
    }
}"#;

/// Bearer ticket issued by the sign-in service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub legacy_auth_id: String,
}

/// Where the client is in the credential lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(Credential),
    Refreshing,
}

pub struct GatewayClient {
    client: Client,
    completion_url: Url,
    signin_url: Url,
    config: GatewayConfig,
    state: Mutex<AuthState>,
    store: Arc<StateStore>,
    notifier: Arc<dyn Notifier>,
}

impl GatewayClient {
    pub fn new(
        config: &GatewayConfig,
        store: Arc<StateStore>,
        notifier: Arc<dyn Notifier>,
    ) -> BhResult<Self> {
        let completion_url = require_url("gateway", &config.completion_url)?;
        let signin_url = require_url("gateway sign-in", &config.signin_url)?;
        require_model("gateway", &config.model)?;

        let state = match load_credential(&store) {
            Some(credential) => {
                info!("🎫 Loaded saved gateway ticket");
                AuthState::Authenticated(credential)
            }
            None => {
                debug!("No saved gateway ticket found");
                AuthState::Unauthenticated
            }
        };

        Ok(Self {
            client: Client::new(),
            completion_url,
            signin_url,
            config: config.clone(),
            state: Mutex::new(state),
            store,
            notifier,
        })
    }

    pub fn auth_state(&self) -> AuthState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(AuthState::Unauthenticated)
    }

    fn set_state(&self, next: AuthState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    fn current_credential(&self) -> Option<Credential> {
        match self.auth_state() {
            AuthState::Authenticated(credential) => Some(credential),
            _ => None,
        }
    }

    /// Exchange username/password for a new ticket and persist it
    pub async fn sign_in(&self) -> BhResult<Credential> {
        self.set_state(AuthState::Refreshing);
        match self.request_ticket().await {
            Ok(credential) => {
                info!("🎫 Generated new gateway ticket");
                match serde_json::to_string(&credential) {
                    Ok(blob) => {
                        if let Err(e) = self.store.set(CREDENTIAL_KEY, blob) {
                            warn!("⚠️ Failed to save gateway ticket: {}", e);
                        }
                    }
                    Err(e) => warn!("⚠️ Failed to encode gateway ticket: {}", e),
                }
                self.set_state(AuthState::Authenticated(credential.clone()));
                Ok(credential)
            }
            Err(e) => {
                warn!("❌ Failed to generate token: {}", e);
                self.set_state(AuthState::Unauthenticated);
                Err(e)
            }
        }
    }

    async fn request_ticket(&self) -> BhResult<Credential> {
        let body = json!({
            "query": SIGN_IN_MUTATION,
            "operationName": SIGN_IN_OPERATION,
            "variables": {
                "input": {
                    "username": self.config.username,
                    "password": self.config.password,
                    "intent": {
                        "appGroup": "Identity",
                        "assetAlias": self.config.app_id,
                    }
                }
            }
        });

        let authorization = format!(
            "{} intuit_appid={}, intuit_app_secret={}",
            AUTH_SCHEME, self.config.app_id, self.config.app_secret
        );

        let response = self
            .client
            .post(self.signin_url.clone())
            .header("Authorization", authorization)
            .json(&body)
            .send()
            .await
            .map_err(|e| BhError::SignIn {
                error: "API Error".to_string(),
                details: Some(e.to_string()),
            })?;

        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        // The payload carries the new ticket; only its size is logged
        debug!("Token API responded {} ({} bytes)", status, body_text.len());

        parse_ticket(&body_text)
    }

    fn authorization(&self, credential: Option<&Credential>) -> String {
        format!(
            "{} intuit_token_type=\"IAM-Ticket\",intuit_appid={},intuit_app_secret={},intuit_userid={},intuit_token={}",
            AUTH_SCHEME,
            self.config.app_id,
            self.config.app_secret,
            credential.map(|c| c.legacy_auth_id.as_str()).unwrap_or(""),
            credential.map(|c| c.access_token.as_str()).unwrap_or(""),
        )
    }

    fn completion_body(&self, content: &str) -> Value {
        json!({
            "conversation_id": chrono::Utc::now().timestamp().to_string(),
            "llm_params": {
                "llm_configuration": {
                    "top_p": 0.9,
                    "top_k": 5.962133916683182,
                    "temperature": 0.8008281904610115,
                    "context": "context",
                    "model": self.config.model,
                },
                "messages": [{
                    "role": "user",
                    "content": content,
                }]
            }
        })
    }

    async fn call_completion(&self, content: &str) -> BhResult<String> {
        let credential = self.current_credential();
        let response = self
            .client
            .post(self.completion_url.clone())
            .header("Authorization", self.authorization(credential.as_ref()))
            .json(&self.completion_body(content))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(status_error("gateway", response).await);
        }

        let body_text = response.text().await?;
        debug!("API response payload: {}", body_text);
        parse_answer(&body_text)
    }
}

#[async_trait]
impl LlmClient for GatewayClient {
    async fn send_text(&self, request: &TransformRequest) -> BhResult<String> {
        let text = truncate_chars(&request.text, self.config.max_input_chars);
        let content = compose_prompt(
            &self.config.pre_prompt,
            "\n",
            &TransformRequest::new(text, request.mode),
        );

        for attempt in 1..=MAX_ATTEMPTS {
            match self.call_completion(&content).await {
                Ok(answer) => return Ok(answer),
                Err(e) if e.is_auth_rejection() => {
                    if attempt == MAX_ATTEMPTS {
                        warn!("❌ Gateway still rejecting after {} attempts", attempt);
                        break;
                    }
                    warn!("🔐 Gateway rejected ticket ({}), signing in", e);
                    if attempt > 1 {
                        self.notifier.notify("Token expired, retrying...").await;
                    }
                    self.sign_in().await?;
                    info!("🔁 Retrying gateway call ({}/{})", attempt + 1, MAX_ATTEMPTS);
                }
                Err(e) => {
                    warn!("❌ Gateway call failed: {}", e);
                    return Err(e);
                }
            }
        }

        Err(BhError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }

    fn name(&self) -> &str {
        "Enterprise Gateway"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Gateway
    }
}

fn load_credential(store: &StateStore) -> Option<Credential> {
    let blob = store.get(CREDENTIAL_KEY)?;
    match serde_json::from_str(&blob) {
        Ok(credential) => Some(credential),
        Err(e) => {
            warn!("⚠️ Failed to load saved gateway ticket: {}", e);
            None
        }
    }
}

/// Keep at most `max` characters; 0 disables the limit
fn truncate_chars(text: &str, max: usize) -> String {
    if max == 0 {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

fn parse_answer(body: &str) -> BhResult<String> {
    let json: Value =
        serde_json::from_str(body).map_err(|e| BhError::malformed("gateway", e.to_string()))?;
    let content = json
        .get("answer")
        .and_then(|a| a.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| BhError::malformed("gateway", "missing answer.content"))?;
    Ok(extract_fenced_block(content))
}

fn parse_ticket(body: &str) -> BhResult<Credential> {
    let invalid = || BhError::SignIn {
        error: "Invalid Response".to_string(),
        details: None,
    };

    let json: Value = serde_json::from_str(body).map_err(|_| invalid())?;

    let errors = json
        .pointer("/data/errors")
        .or_else(|| json.get("errors"))
        .and_then(Value::as_array);
    if let Some(first) = errors.and_then(|e| e.first()) {
        let details = first
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| first.to_string());
        return Err(BhError::SignIn {
            error: "API Error".to_string(),
            details: Some(details),
        });
    }

    let result = json
        .pointer(&format!("/data/{SIGN_IN_OPERATION}"))
        .ok_or_else(invalid)?;
    let field = |name: &str| result.get(name).and_then(Value::as_str).map(str::to_string);
    match (field("accessToken"), field("legacyAuthId")) {
        (Some(access_token), Some(legacy_auth_id)) => Ok(Credential {
            access_token,
            legacy_auth_id,
        }),
        _ => Err(invalid()),
    }
}
