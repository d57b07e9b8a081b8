//! Structured model replies.
//!
//! A chat-completions reply is either final text or a list of tool calls
//! (sometimes both). [`LlmResponse`] models that as content blocks so the
//! orchestrator can branch on [`has_tool_calls`](LlmResponse::has_tool_calls).

use crate::tool::{ToolArguments, ToolCallRequest};
use serde::{Deserialize, Serialize};

/// A single block of content within a model reply.
///
/// ```
/// use aion_domain::conversation::ContentBlock;
///
/// let text = ContentBlock::Text("Let me calculate that.".to_string());
/// assert!(text.as_text().is_some());
///
/// let tool = ContentBlock::ToolUse {
///     id: "call_abc123".to_string(),
///     name: "calculator".to_string(),
///     input: [("expression".to_string(), serde_json::json!("2+2"))]
///         .into_iter().collect(),
/// };
/// assert!(tool.as_tool_use().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(String),

    /// A tool call requested by the model.
    ToolUse {
        /// API-assigned id used to correlate the tool-result message.
        id: String,
        name: String,
        input: ToolArguments,
    },
}

impl ContentBlock {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<(&str, &str, &ToolArguments)> {
        match self {
            ContentBlock::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        }
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    /// The model wants tools executed before it continues.
    ToolUse,
    MaxTokens,
    Other(String),
}

impl StopReason {
    /// Map an OpenAI-style `finish_reason`.
    pub fn from_finish_reason(reason: &str) -> Self {
        match reason {
            "stop" => StopReason::EndTurn,
            "tool_calls" | "function_call" => StopReason::ToolUse,
            "length" => StopReason::MaxTokens,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// A structured reply from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
    /// Model identifier, if returned by the API.
    pub model: Option<String>,
}

impl LlmResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text(text.into())],
            stop_reason: Some(StopReason::EndTurn),
            model: None,
        }
    }

    /// Reply consisting only of tool calls.
    pub fn from_tool_calls(calls: impl IntoIterator<Item = ToolCallRequest>) -> Self {
        Self {
            content: calls
                .into_iter()
                .map(|c| ContentBlock::ToolUse {
                    id: c.id,
                    name: c.tool_name,
                    input: c.arguments,
                })
                .collect(),
            stop_reason: Some(StopReason::ToolUse),
            model: None,
        }
    }

    /// Concatenate all `Text` blocks.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| b.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool-use blocks as requests, in the order the model emitted them.
    pub fn tool_calls(&self) -> Vec<ToolCallRequest> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCallRequest::new(id, name).with_arguments(input.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_creates_text_only_response() {
        let response = LlmResponse::from_text("The answer is 12402.");
        assert_eq!(response.text_content(), "The answer is 12402.");
        assert!(!response.has_tool_calls());
        assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
    }

    #[test]
    fn tool_calls_keep_emission_order() {
        let response = LlmResponse {
            content: vec![
                ContentBlock::Text("Checking two things.".to_string()),
                ContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "calculator".to_string(),
                    input: [("expression".to_string(), serde_json::json!("1+1"))]
                        .into_iter()
                        .collect(),
                },
                ContentBlock::ToolUse {
                    id: "call_2".to_string(),
                    name: "knowledge_base_search".to_string(),
                    input: [("query".to_string(), serde_json::json!("invoices"))]
                        .into_iter()
                        .collect(),
                },
            ],
            stop_reason: Some(StopReason::ToolUse),
            model: Some("openai/gpt-4o-mini".to_string()),
        };

        let calls = response.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[1].tool_name, "knowledge_base_search");
        assert_eq!(response.text_content(), "Checking two things.");
    }

    #[test]
    fn from_tool_calls_round_trips_requests() {
        let request = ToolCallRequest::new("call_9", "foo").with_arg("x", 1);
        let response = LlmResponse::from_tool_calls([request.clone()]);
        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls(), vec![request]);
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(StopReason::from_finish_reason("stop"), StopReason::EndTurn);
        assert_eq!(
            StopReason::from_finish_reason("tool_calls"),
            StopReason::ToolUse
        );
        assert_eq!(
            StopReason::from_finish_reason("content_filter"),
            StopReason::Other("content_filter".to_string())
        );
    }
}
