use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::error::Result;
use super::inference::ChatBackend;
use super::tool_planner::{ToolKind, ToolPlanStep};
use crate::tools::{CodeRunner, SearchCredentials, WebSearch};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResult {
    pub tool: ToolKind,
    pub output: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub results: Vec<ToolResult>,
    pub tools_used: Vec<ToolKind>,
}

pub struct ToolExecutor {
    runner: Arc<dyn CodeRunner>,
    search: Arc<dyn WebSearch>,
    backend: Arc<dyn ChatBackend>,
}

impl ToolExecutor {
    pub fn new(
        runner: Arc<dyn CodeRunner>,
        search: Arc<dyn WebSearch>,
        backend: Arc<dyn ChatBackend>,
    ) -> Self {
        Self {
            runner,
            search,
            backend,
        }
    }

    /// Runs every step in plan order, one at a time.
    ///
    /// Code and search steps cannot fail; their problems end up in the
    /// output text. A failing delegated call aborts the whole plan.
    pub async fn execute(
        &self,
        plan: &[ToolPlanStep],
        credential: &str,
        search_credentials: &SearchCredentials,
    ) -> Result<Execution> {
        let mut execution = Execution::default();

        for (index, step) in plan.iter().enumerate() {
            info!("Running step {}/{}: {}", index + 1, plan.len(), step.tool);
            let output = match step.tool {
                ToolKind::RunCode => self.runner.run(&step.input).await,
                ToolKind::WebSearch => self.search.search(&step.input, search_credentials).await,
                ToolKind::DelegateCall => self.backend.call(&step.input, credential).await?,
            };
            execution.tools_used.push(step.tool);
            execution.results.push(ToolResult {
                tool: step.tool,
                output,
            });
        }

        Ok(execution)
    }
}
