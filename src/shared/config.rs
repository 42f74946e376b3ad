use std::time::Duration;

use clap::Args;

use crate::agent::credentials::{parse_model_keys, CredentialStore};

pub const DEFAULT_COMPLETIONS_URL: &str = "https://aipipe.org/openrouter/v1/chat/completions";
pub const DEFAULT_COMPLETION_MODEL: &str = "openai/gpt-4.1";
pub const DEFAULT_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Settings shared by every binary. Each field falls back to an
/// environment variable, and `.env` is loaded first by `load_dotenv`.
#[derive(Debug, Clone, Args)]
pub struct AgentSettings {
    /// Primary chat-completion API key
    #[arg(long, env = "AI_PIPE_KEY", hide_env_values = true)]
    pub ai_pipe_key: Option<String>,

    /// Backup API keys tried in order after the primary
    #[arg(
        long,
        env = "AI_PIPE_BACKUP_KEYS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub backup_keys: Vec<String>,

    /// Model-specific keys as `model=key`, checked before the primary key
    #[arg(
        long,
        env = "TOOLRELAY_MODEL_KEYS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub model_keys: Vec<String>,

    /// Google Custom Search API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    /// Google Custom Search engine id
    #[arg(long, env = "GOOGLE_CX")]
    pub google_cx: Option<String>,

    #[arg(long, env = "TOOLRELAY_COMPLETIONS_URL", default_value = DEFAULT_COMPLETIONS_URL)]
    pub completions_url: String,

    /// Model name sent in completion requests
    #[arg(long, env = "TOOLRELAY_COMPLETION_MODEL", default_value = DEFAULT_COMPLETION_MODEL)]
    pub completion_model: String,

    #[arg(long, env = "TOOLRELAY_SEARCH_URL", default_value = DEFAULT_SEARCH_URL)]
    pub search_url: String,

    /// Wall-clock limit for sandboxed code, in milliseconds
    #[arg(long, env = "TOOLRELAY_SANDBOX_TIMEOUT_MS", default_value_t = 2000)]
    pub sandbox_timeout_ms: u64,

    /// Node.js binary used by the code sandbox
    #[arg(long, env = "TOOLRELAY_NODE_BIN", default_value = "node")]
    pub node_bin: String,

    #[arg(long, env = "TOOLRELAY_HTTP_TIMEOUT_SECS", default_value_t = 60)]
    pub http_timeout_secs: u64,
}

impl AgentSettings {
    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_millis(self.sandbox_timeout_ms.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(
            self.ai_pipe_key.clone(),
            self.backup_keys.clone(),
            parse_model_keys(&self.model_keys),
        )
    }
}

/// Loads `.env` from the working directory if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => eprintln!("Warning: failed to load .env: {}", e),
    }
}
