// Tool-orchestration pipeline: planner, executor, aggregator, failover
pub mod aggregator;
pub mod conversation;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod failover;
pub mod inference;
pub mod tool_planner;

use std::sync::Arc;

use crate::shared::config::AgentSettings;
use crate::tools::{NodeSandbox, SearchCredentials, WebSearchClient};

pub use conversation::ConversationState;
pub use credentials::CredentialStore;
pub use error::{AgentError, Result};
pub use executor::{ToolExecutor, ToolResult};
pub use failover::CredentialFailoverClient;
pub use inference::{ChatBackend, InferenceClient};
pub use tool_planner::{ToolChoicePlanner, ToolKind, ToolPlan, ToolPlanStep};

/// Wires the HTTP-backed capabilities described by `settings`.
pub fn build_client(settings: &AgentSettings) -> anyhow::Result<CredentialFailoverClient> {
    let inference = Arc::new(InferenceClient::new(
        &settings.completions_url,
        &settings.completion_model,
        settings.http_timeout(),
    )?);
    let search = Arc::new(WebSearchClient::new(
        &settings.search_url,
        settings.http_timeout(),
    )?);
    let sandbox = Arc::new(NodeSandbox::new(
        &settings.node_bin,
        settings.sandbox_timeout(),
    ));

    let planner = ToolChoicePlanner::new(inference.clone());
    let executor = ToolExecutor::new(sandbox, search, inference);
    let credentials = Arc::new(settings.credential_store());
    let search_credentials = SearchCredentials {
        api_key: settings.google_api_key.clone().unwrap_or_default(),
        engine_id: settings.google_cx.clone().unwrap_or_default(),
    };

    Ok(CredentialFailoverClient::new(
        planner,
        executor,
        credentials,
        search_credentials,
    ))
}
