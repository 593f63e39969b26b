use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const REWRITE_PRE_PROMPT: &str = "You will be given text in Markdown format. Please rewrite this text in a professional yet conversational tone, correcting any grammatical errors, and provide your response in Markdown format. Ensure no additional content is added, only the given text is re-written. ";

const OLLAMA_PRE_PROMPT: &str = "You are a helpful and professional assistant. You will be given a piece of text. Your task is to rewrite this text to make it more professional and suitable for a formal setting.  Please ensure the following:\n\n* Use a polite and courteous tone.\n* Correct any grammatical errors or typos.\n* Improve the clarity and conciseness of the writing. \n* Do not change the meaning of the original text.\n\nPlease return only the rewritten text, enclosed in Markdown code blocks, using the following format:\n\n```markdown\nRewritten text goes here\n```";

const GEMINI_PRE_PROMPT: &str = "You will be given text in Markdown format. Please rewrite this text in a professional yet conversational tone, correcting any grammatical errors, capitalized appropriately, added punctuations and provide only the rewritten text in Markdown format and nothing else. No additional text or symbols (other than comma dot and question mark) in your response, only the given text re-written.";

/// Which LLM backend handles transformations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Ollama,
    Gateway,
    #[serde(rename = "openai")]
    OpenAi,
    Claude,
    Gemini,
}

impl BackendKind {
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Ollama,
        BackendKind::Gateway,
        BackendKind::OpenAi,
        BackendKind::Claude,
        BackendKind::Gemini,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::Gateway => "gateway",
            BackendKind::OpenAi => "openai",
            BackendKind::Claude => "claude",
            BackendKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        BackendKind::ALL
            .into_iter()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| {
                format!(
                    "unknown backend '{s}' (expected one of: ollama, gateway, openai, claude, gemini)"
                )
            })
    }
}

/// Local inference server (Ollama)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    pub pre_prompt: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama2".to_string(),
            pre_prompt: OLLAMA_PRE_PROMPT.to_string(),
        }
    }
}

/// Enterprise gateway requiring a credential exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub completion_url: String,
    pub signin_url: String,
    pub app_id: String,
    pub app_secret: String,
    pub username: String,
    pub password: String,
    pub model: String,
    pub pre_prompt: String,
    pub max_input_chars: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            completion_url: "https://genpluginregistry-e2e.api.intuit.com/v1/llmexpress/chat/completion?experience_id=5774189b-93c5-4bab-adf3-3601d9b03a12".to_string(),
            signin_url: "https://identityinternal-e2e.api.intuit.com/signin/graphql".to_string(),
            app_id: String::new(),
            app_secret: String::new(),
            username: String::new(),
            password: String::new(),
            model: "gpt-4-32k".to_string(),
            pre_prompt: REWRITE_PRE_PROMPT.to_string(),
            max_input_chars: 8048,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub pre_prompt: String,
    pub max_tokens: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            pre_prompt: REWRITE_PRE_PROMPT.to_string(),
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub pre_prompt: String,
    pub max_tokens: u32,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model: "claude-2.1".to_string(),
            pre_prompt: REWRITE_PRE_PROMPT.to_string(),
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub pre_prompt: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            model: "gemini-1.5-pro-latest".to_string(),
            pre_prompt: GEMINI_PRE_PROMPT.to_string(),
        }
    }
}

/// Per-backend settings, persisted side by side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub ollama: OllamaConfig,
    pub gateway: GatewayConfig,
    pub openai: OpenAiConfig,
    pub claude: ClaudeConfig,
    pub gemini: GeminiConfig,
}

/// Settings of exactly one backend, handed to the client factory
#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    Ollama(OllamaConfig),
    Gateway(GatewayConfig),
    OpenAi(OpenAiConfig),
    Claude(ClaudeConfig),
    Gemini(GeminiConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Ollama(_) => BackendKind::Ollama,
            BackendConfig::Gateway(_) => BackendKind::Gateway,
            BackendConfig::OpenAi(_) => BackendKind::OpenAi,
            BackendConfig::Claude(_) => BackendKind::Claude,
            BackendConfig::Gemini(_) => BackendKind::Gemini,
        }
    }
}

/// Shell commands used to read/write the clipboard and drive the focused window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    pub read_command: Vec<String>,
    pub write_command: Vec<String>,
    pub copy_keys_command: Vec<String>,
    pub paste_keys_command: Vec<String>,
    pub focus_command: Vec<String>,
    /// Delay between the copy keystroke and reading the clipboard
    pub settle_ms: u64,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        let words = |s: &str| s.split_whitespace().map(str::to_string).collect();
        Self {
            read_command: words("xclip -selection clipboard -o"),
            write_command: words("xclip -selection clipboard -i"),
            copy_keys_command: words("xdotool key --clearmodifiers ctrl+c"),
            paste_keys_command: words("xdotool key --clearmodifiers ctrl+v"),
            focus_command: words("xdotool getactivewindow"),
            settle_ms: 100,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub selected_backend: BackendKind,
    pub transform_timeout_secs: u64,
    pub notifier: String,
    pub log_level: String,
    pub clipboard: ClipboardConfig,
    pub backends: BackendsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            selected_backend: BackendKind::default(),
            transform_timeout_secs: 10,
            notifier: "desktop".to_string(),
            log_level: "info".to_string(),
            clipboard: ClipboardConfig::default(),
            backends: BackendsConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a file; a corrupt file is backed up and replaced by defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        // API keys and the gateway password live here: user only, rw-------
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        Ok(())
    }

    /// Settings for one backend
    pub fn backend(&self, kind: BackendKind) -> BackendConfig {
        match kind {
            BackendKind::Ollama => BackendConfig::Ollama(self.backends.ollama.clone()),
            BackendKind::Gateway => BackendConfig::Gateway(self.backends.gateway.clone()),
            BackendKind::OpenAi => BackendConfig::OpenAi(self.backends.openai.clone()),
            BackendKind::Claude => BackendConfig::Claude(self.backends.claude.clone()),
            BackendKind::Gemini => BackendConfig::Gemini(self.backends.gemini.clone()),
        }
    }

    /// Settings for the currently selected backend
    pub fn active_backend(&self) -> BackendConfig {
        self.backend(self.selected_backend)
    }

    pub fn transform_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.transform_timeout_secs.max(1))
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bhelper")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.selected_backend, BackendKind::Ollama);
        assert_eq!(config.transform_timeout_secs, 10);
        assert_eq!(config.backends.gateway.max_input_chars, 8048);
        assert_eq!(config.backends.ollama.url, "http://localhost:11434");
        assert_eq!(config.clipboard.settle_ms, 100);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.selected_backend = BackendKind::OpenAi;
        let json = serde_json::to_string(&config).expect("Failed to serialize");
        assert!(json.contains("\"selected_backend\":\"openai\""));
        let restored: Config = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(config, restored);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{"selected_backend":"claude","backends":{"claude":{"api_key":"k"}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.selected_backend, BackendKind::Claude);
        assert_eq!(config.backends.claude.api_key, "k");
        assert_eq!(config.backends.claude.model, "claude-2.1");
        assert_eq!(config.transform_timeout_secs, 10);
    }

    #[test]
    fn test_active_backend_is_tagged() {
        let mut config = Config::default();
        config.selected_backend = BackendKind::Gateway;
        match config.active_backend() {
            BackendConfig::Gateway(g) => assert_eq!(g.model, "gpt-4-32k"),
            other => panic!("expected gateway, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("OpenAI".parse::<BackendKind>(), Ok(BackendKind::OpenAi));
        assert_eq!(" gemini ".parse::<BackendKind>(), Ok(BackendKind::Gemini));
        assert!("gpt5".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_saved_config_is_user_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bhelper").join("config.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let mut config = Config::default();
        config.backends.openai.api_key = "sk-secret".to_string();
        config.save_to(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_config_corrupt_file_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid json").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(!path.exists());
        assert!(dir.path().join("config.json.corrupt").exists());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let mut config = Config::default();
        config.backends.gemini.api_key = "secret".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.backends.gemini.api_key, "secret");
    }
}
