use super::conversation::{ChatMessage, ConversationState};
use super::error::{AgentError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DIRECT_CALL_SYSTEM_PROMPT: &str =
    "You must reply to what the user has asked, the reply should be concise and relevant.";

/// A chat-completion backend. Failures are hard: they propagate so the
/// caller can fail over to another credential.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], credential: &str) -> Result<String>;

    /// Single-prompt call with the fixed "concise and relevant" instruction.
    async fn call(&self, prompt: &str, credential: &str) -> Result<String> {
        let messages = [
            ChatMessage::system(DIRECT_CALL_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        self.complete(&messages, credential).await
    }

    /// Planning call over the whole session history.
    async fn plan_call(&self, conversation: &ConversationState, credential: &str) -> Result<String> {
        self.complete(conversation.messages(), credential).await
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    url: String,
    model: String,
    log_seq: Arc<AtomicU64>,
}

impl InferenceClient {
    pub fn new(url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Upstream(format!("Failed to create inference client: {}", e)))?;

        Ok(Self {
            client,
            url: url.trim().to_string(),
            model: model.trim().to_string(),
            log_seq: Arc::new(AtomicU64::new(0)),
        })
    }
}

#[async_trait]
impl ChatBackend for InferenceClient {
    async fn complete(&self, messages: &[ChatMessage], credential: &str) -> Result<String> {
        let log_id = self.log_seq.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Inference request #{} to {} ({} messages)",
            log_id,
            self.url,
            messages.len()
        );

        let body = CompletionRequest {
            model: &self.model,
            messages,
        };
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response>".to_string());
            return Err(AgentError::Upstream(format!(
                "Inference service error ({}): {}",
                status,
                truncate(&text, 400)
            )));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::Upstream(format!("Failed to read response text: {}", e)))?;
        debug!("Inference response #{} ({} bytes)", log_id, text.len());

        extract_content(&text)
    }
}

/// Pulls `choices[0].message.content` out of a completion body.
pub fn extract_content(body: &str) -> Result<String> {
    let parsed: CompletionResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AgentError::Upstream("Completion response had no message content".into()))
}

fn truncate(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        input.to_string()
    } else {
        let head: String = input.chars().take(max).collect();
        format!("{}...", head)
    }
}
