use super::executor::ToolResult;
use super::tool_planner::ToolKind;

const TOOLS_USED_PREFIX: &str = "Tools Used: ";

/// Joins step outputs with a blank line and appends the `Tools Used:` record.
pub fn format(results: &[ToolResult]) -> String {
    let kinds: Vec<ToolKind> = results.iter().map(|r| r.tool).collect();
    let record = format!("{}{}", TOOLS_USED_PREFIX, tools_used_json(&kinds));

    if results.is_empty() {
        return record;
    }

    let mut sections: Vec<&str> = results.iter().map(|r| r.output.as_str()).collect();
    sections.push(&record);
    sections.join("\n\n")
}

fn tools_used_json(kinds: &[ToolKind]) -> String {
    let names: Vec<&str> = kinds.iter().map(ToolKind::as_str).collect();
    serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
}
