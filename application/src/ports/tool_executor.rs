//! Tool Executor port
//!
//! Defines how the application resolves, describes and executes tools.

use aion_domain::{ToolCallRequest, ToolCallResult, ToolChoice, ToolContext, ToolDefinition};
use async_trait::async_trait;

/// Port for tool execution
///
/// Implementations never fail: every outcome, including unknown tools and
/// timeouts, comes back as a [`ToolCallResult`].
#[async_trait]
pub trait ToolExecutorPort: Send + Sync {
    /// Definitions of all registered tools, sorted by name.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Check if a tool is registered
    fn has_tool(&self, name: &str) -> bool {
        self.definitions().iter().any(|d| d.name == name)
    }

    /// Names of all registered tools
    fn available_tools(&self) -> Vec<String> {
        self.definitions().into_iter().map(|d| d.name).collect()
    }

    /// Model-facing schema for the enabled tools under `choice`.
    ///
    /// `enabled = None` means every registered tool. `ToolChoice::None`
    /// always yields an empty schema; `Forced(name)` yields at most that
    /// one tool.
    fn schema_for(&self, enabled: Option<&[String]>, choice: &ToolChoice) -> Vec<serde_json::Value>;

    /// Execute one tool call.
    async fn execute(&self, call: &ToolCallRequest, ctx: &ToolContext) -> ToolCallResult;
}
