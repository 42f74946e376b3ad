use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::conversation::ConversationState;
use super::error::Result;
use super::inference::ChatBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    RunCode,
    WebSearch,
    DelegateCall,
}

impl ToolKind {
    /// Resolves a planner-supplied tool name. Legacy names from the first
    /// prompt revision are still accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "runcode" | "run_code" | "runsandboxedjs" => Some(ToolKind::RunCode),
            "websearch" | "web_search" | "googlesearch" => Some(ToolKind::WebSearch),
            "delegatecall" | "delegate_call" | "llm_call" => Some(ToolKind::DelegateCall),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::RunCode => "RunCode",
            ToolKind::WebSearch => "WebSearch",
            ToolKind::DelegateCall => "DelegateCall",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPlanStep {
    pub tool: ToolKind,
    pub input: String,
}

impl ToolPlanStep {
    pub fn new(tool: ToolKind, input: impl Into<String>) -> Self {
        Self {
            tool,
            input: input.into(),
        }
    }
}

pub type ToolPlan = Vec<ToolPlanStep>;

/// Outcome of validating raw planner output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPlan {
    Valid(ToolPlan),
    Fallback(ToolPlan),
}

impl ParsedPlan {
    pub fn into_plan(self) -> ToolPlan {
        match self {
            ParsedPlan::Valid(plan) | ParsedPlan::Fallback(plan) => plan,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParsedPlan::Fallback(_))
    }
}

/// Validates the model's reply as a JSON array of `{tool, input}` objects.
///
/// Anything else yields a single delegated call carrying the user message.
pub fn parse_plan(raw: &str, user_message: &str) -> ParsedPlan {
    match parse_steps(raw) {
        Some(plan) => ParsedPlan::Valid(plan),
        None => ParsedPlan::Fallback(vec![ToolPlanStep::new(
            ToolKind::DelegateCall,
            user_message,
        )]),
    }
}

fn parse_steps(raw: &str) -> Option<ToolPlan> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let items = value.as_array()?;
    items.iter().map(parse_step).collect()
}

fn parse_step(item: &Value) -> Option<ToolPlanStep> {
    let obj = item.as_object()?;
    let name = obj.get("tool")?.as_str()?;
    let input = obj.get("input")?.as_str()?;
    let tool = ToolKind::from_name(name).unwrap_or_else(|| {
        warn!(
            "Planner named unknown tool '{}'; dispatching as DelegateCall",
            name
        );
        ToolKind::DelegateCall
    });
    Some(ToolPlanStep::new(tool, input))
}

pub struct ToolChoicePlanner {
    backend: Arc<dyn ChatBackend>,
}

impl ToolChoicePlanner {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Records the message, asks the model for a plan and records its raw
    /// reply. Only a failing model call is an error.
    pub async fn plan(
        &self,
        conversation: &mut ConversationState,
        user_message: &str,
        credential: &str,
    ) -> Result<ToolPlan> {
        conversation.push_user(user_message);

        let raw = self.backend.plan_call(conversation, credential).await?;

        let parsed = parse_plan(&raw, user_message);
        if parsed.is_fallback() {
            warn!(
                "Planner returned no usable plan; falling back to DelegateCall. raw={}",
                truncate_raw(&raw)
            );
        }

        conversation.push_assistant(raw);
        conversation.enforce_limit();

        let plan = parsed.into_plan();
        info!(
            "Planned {} step(s): {:?}",
            plan.len(),
            plan.iter().map(|s| s.tool.as_str()).collect::<Vec<_>>()
        );
        Ok(plan)
    }
}

fn truncate_raw(raw: &str) -> String {
    const MAX_LEN: usize = 400;
    if raw.chars().count() <= MAX_LEN {
        raw.to_string()
    } else {
        let head: String = raw.chars().take(MAX_LEN).collect();
        format!("{}...", head)
    }
}
