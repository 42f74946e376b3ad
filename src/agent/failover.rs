use std::sync::Arc;

use tracing::{info, warn};

use super::aggregator;
use super::conversation::ConversationState;
use super::credentials::CredentialStore;
use super::error::{AgentError, Result};
use super::executor::ToolExecutor;
use super::tool_planner::ToolChoicePlanner;
use crate::tools::SearchCredentials;

/// Runs plan -> execute -> format, moving to the next credential whenever
/// an attempt fails outright.
pub struct CredentialFailoverClient {
    planner: ToolChoicePlanner,
    executor: ToolExecutor,
    credentials: Arc<CredentialStore>,
    search_credentials: SearchCredentials,
}

impl CredentialFailoverClient {
    pub fn new(
        planner: ToolChoicePlanner,
        executor: ToolExecutor,
        credentials: Arc<CredentialStore>,
        search_credentials: SearchCredentials,
    ) -> Self {
        Self {
            planner,
            executor,
            credentials,
            search_credentials,
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Produces the reply for `user_message`.
    ///
    /// Each attempt plans against a copy of `conversation`; the copy replaces
    /// the caller's state only when the attempt succeeds, so failed attempts
    /// leave no trace in the planner history.
    pub async fn generate_agent_response(
        &self,
        conversation: &mut ConversationState,
        user_message: &str,
        model: &str,
    ) -> Result<String> {
        let candidates = self.credentials.credentials_for(model);
        if candidates.is_empty() {
            warn!("No credentials configured for model '{}'", model);
        }

        let mut attempts = 0;
        for (index, credential) in candidates.iter().enumerate() {
            attempts += 1;
            let mut working = conversation.clone();
            match self.attempt(&mut working, user_message, credential).await {
                Ok(reply) => {
                    if index > 0 {
                        info!("Credential #{} succeeded after {} failure(s)", index + 1, index);
                    }
                    *conversation = working;
                    return Ok(reply);
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} failed with credential #{}: {}",
                        attempts,
                        candidates.len(),
                        index + 1,
                        e
                    );
                }
            }
        }

        Err(AgentError::AllCredentialsExhausted { attempts })
    }

    async fn attempt(
        &self,
        conversation: &mut ConversationState,
        user_message: &str,
        credential: &str,
    ) -> Result<String> {
        let plan = self
            .planner
            .plan(conversation, user_message, credential)
            .await?;
        let execution = self
            .executor
            .execute(&plan, credential, &self.search_credentials)
            .await?;
        Ok(aggregator::format(&execution.results))
    }
}
