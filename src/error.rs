//! BHelper Error Types
//!
//! Every client failure keeps its kind here. The orchestrator is the only place
//! that flattens an error into "no result + notification".

use thiserror::Error;

/// Central error type for BHelper
#[derive(Error, Debug)]
pub enum BhError {
    /// Never carries the request URL, which may hold a query-string key
    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("{backend} returned HTTP {status}")]
    Status {
        backend: String,
        status: u16,
        body: String,
    },

    #[error("unexpected {backend} response: {reason}")]
    MalformedResponse { backend: String, reason: String },

    #[error("sign-in failed: {error}")]
    SignIn {
        error: String,
        details: Option<String>,
    },

    #[error("gave up after {attempts} rejected attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for BHelper operations
pub type BhResult<T> = Result<T, BhError>;

impl BhError {
    pub fn malformed(backend: &str, reason: impl Into<String>) -> Self {
        BhError::MalformedResponse {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }

    /// 401/403 from a backend: the credential was refused.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, BhError::Status { status, .. } if *status == 401 || *status == 403)
    }

    /// Text shown to the user when this error ends a transformation.
    pub fn user_message(&self) -> String {
        match self {
            BhError::Transport(e) => format!("API call failed - {e}"),
            BhError::Status { status, .. } => {
                format!("API request failed with status code: {status}")
            }
            BhError::MalformedResponse { .. } => "Failed to parse API response".to_string(),
            BhError::SignIn { error, details } => format!(
                "Failed to generate token: {}. {}",
                error,
                details.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string(),
            BhError::RetriesExhausted { attempts } => {
                format!("API request failed after {attempts} attempts")
            }
            BhError::Config(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for BhError {
    fn from(err: reqwest::Error) -> Self {
        BhError::Transport(err.without_url())
    }
}

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for BhError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        BhError::Other(anyhow::anyhow!("lock poisoned: {err}"))
    }
}
