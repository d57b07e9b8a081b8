//! Tool contract
//!
//! [`ToolContract`] is the capability interface every tool implements,
//! whether it runs in-process (calculator, code runner, knowledge base)
//! or forwards to a remote capability server over a protocol session.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 ToolRegistry                 │
//! │  name → Arc<dyn ToolContract>, timeouts      │
//! └──────────────────────────────────────────────┘
//!        │              │               │
//!        ▼              ▼               ▼
//!  ┌───────────┐  ┌───────────┐  ┌─────────────┐
//!  │Calculator │  │CodeRunner │  │ RemoteTool  │──▶ ProtocolSessionClient
//!  └───────────┘  └───────────┘  └─────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::entities::{ToolArguments, ToolDefinition, ToolParameter};
use super::value_objects::ToolError;

/// Default per-call timeout for tools that do not override it.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call execution context handed to every tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContext {
    /// End user on whose behalf the call runs (selects credentials and sessions)
    pub user_id: Option<String>,
    /// Turn identifier, for log correlation
    pub turn_id: Option<String>,
}

impl ToolContext {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            turn_id: None,
        }
    }

    pub fn with_turn(mut self, turn_id: impl Into<String>) -> Self {
        self.turn_id = Some(turn_id.into());
        self
    }
}

/// A capability the model may invoke.
///
/// Implementations describe themselves through a [`ToolDefinition`] and
/// execute against a JSON argument map. Execution returns a typed
/// [`ToolError`] on failure; the registry turns both outcomes into a
/// [`ToolCallResult`](super::value_objects::ToolCallResult).
#[async_trait]
pub trait ToolContract: Send + Sync {
    /// Schema of this tool (name, description, parameters).
    fn definition(&self) -> &ToolDefinition;

    /// Stable, model-visible identifier.
    fn name(&self) -> &str {
        &self.definition().name
    }

    fn description(&self) -> &str {
        &self.definition().description
    }

    fn parameters(&self) -> &[ToolParameter] {
        &self.definition().parameters
    }

    /// Tool-specific timeout; short for compute, longer for network.
    fn default_timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }

    /// Run the tool.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError>;
}
