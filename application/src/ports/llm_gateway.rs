//! LLM Gateway port
//!
//! Defines how the application talks to a chat-completions model with
//! native tool calling.

use aion_domain::{LlmResponse, Message, ToolChoice};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during LLM gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Other error: {0}")]
    Other(String),
}

/// One model request: history, the filtered tool schema and the mode.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    /// Model-facing function schema (already filtered by the tool choice).
    pub tools: Vec<serde_json::Value>,
    pub tool_choice: ToolChoice,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<serde_json::Value>, choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = choice;
        self
    }
}

/// Gateway for model communication
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Identifier of the configured model, for logging.
    fn model_name(&self) -> &str;

    /// Send one request and return the structured reply.
    async fn complete(&self, request: CompletionRequest) -> Result<LlmResponse, GatewayError>;
}
