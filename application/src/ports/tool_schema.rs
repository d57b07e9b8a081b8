//! Tool schema conversion port.
//!
//! Separates "which tools to offer" (registry) from "how to serialize them
//! for the model API" (infrastructure converter).

use aion_domain::ToolDefinition;

pub trait ToolSchemaPort: Send + Sync {
    /// Convert a single tool definition to the API's function schema.
    fn tool_to_schema(&self, tool: &ToolDefinition) -> serde_json::Value;

    /// Convert several tools, sorted by name.
    fn tools_schema(&self, tools: &[&ToolDefinition]) -> Vec<serde_json::Value> {
        let mut sorted: Vec<&ToolDefinition> = tools.to_vec();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        sorted.into_iter().map(|t| self.tool_to_schema(t)).collect()
    }
}
