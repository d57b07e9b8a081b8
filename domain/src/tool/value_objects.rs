//! Tool domain value objects: results and errors
//!
//! Every dispatch produces a [`ToolCallResult`]. Failures are values here,
//! not panics or propagated errors: the orchestrator folds them back into
//! the conversation so the model can adapt its next request.
//!
//! | Code | Meaning |
//! |------|---------|
//! | `NOT_FOUND` | Model asked for a tool that is not registered |
//! | `TIMEOUT` | Per-call timeout elapsed |
//! | `EXECUTION_FAILED` | Tool ran and failed (may carry a payload) |
//! | `INVALID_ARGUMENT` | Arguments did not satisfy the parameter specs |
//! | `PROTOCOL_TRANSPORT` | HTTP / stream failure talking to a remote server |
//! | `PROTOCOL_SESSION` | Handshake could not be (re-)established |
//! | `PROTOCOL_RPC` | JSON-RPC error object returned by the server |
//! | `PROTOCOL_APPLICATION` | Server result flagged with `isError` |
//! | `AUTH_REQUIRED` | Credential revoked or missing; user must reconnect |

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Typed failure of a single tool call.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolError {
    #[error("Tool '{name}' not found")]
    NotFound { name: String },

    #[error("Tool '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("Tool execution failed: {message}")]
    Execution {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Remote transport error: {0}")]
    ProtocolTransport(String),

    #[error("Remote session error: {0}")]
    ProtocolSession(String),

    #[error("Remote JSON-RPC error (code {code}): {message}")]
    ProtocolRpc { code: i64, message: String },

    #[error("Remote tool reported an error: {0}")]
    ProtocolApplication(String),

    #[error("Authorization required for provider '{provider}': reconnect this account")]
    AuthRequired { provider: String, user: String },
}

impl ToolError {
    pub fn not_found(name: impl Into<String>) -> Self {
        ToolError::NotFound { name: name.into() }
    }

    pub fn timeout(name: impl Into<String>, after: Duration) -> Self {
        ToolError::Timeout {
            name: name.into(),
            timeout_ms: after.as_millis() as u64,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        ToolError::Execution {
            message: message.into(),
            payload: None,
        }
    }

    pub fn execution_with_payload(message: impl Into<String>, payload: serde_json::Value) -> Self {
        ToolError::Execution {
            message: message.into(),
            payload: Some(payload),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ToolError::InvalidArgument(message.into())
    }

    /// Stable error code, independent of the message text.
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::NotFound { .. } => "NOT_FOUND",
            ToolError::Timeout { .. } => "TIMEOUT",
            ToolError::Execution { .. } => "EXECUTION_FAILED",
            ToolError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ToolError::ProtocolTransport(_) => "PROTOCOL_TRANSPORT",
            ToolError::ProtocolSession(_) => "PROTOCOL_SESSION",
            ToolError::ProtocolRpc { .. } => "PROTOCOL_RPC",
            ToolError::ProtocolApplication(_) => "PROTOCOL_APPLICATION",
            ToolError::AuthRequired { .. } => "AUTH_REQUIRED",
        }
    }

    /// Errors the end user has to fix (as opposed to the model).
    pub fn requires_user_action(&self) -> bool {
        matches!(self, ToolError::AuthRequired { .. })
    }
}

/// Outcome status of a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// Result of one dispatched [`ToolCallRequest`](super::entities::ToolCallRequest).
///
/// Appended to the turn trace in request order and echoed back to the model
/// as a tool-result message via [`to_message_content`](Self::to_message_content).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub request_id: String,
    pub tool_name: String,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    pub latency_ms: u64,
}

impl ToolCallResult {
    pub fn success(
        request_id: impl Into<String>,
        tool_name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            status: ToolStatus::Ok,
            payload: Some(payload),
            error: None,
            latency_ms: 0,
        }
    }

    pub fn failure(
        request_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: ToolError,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            status: ToolStatus::Error,
            payload: None,
            error: Some(error),
            latency_ms: 0,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = latency.as_millis() as u64;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Ok
    }

    pub fn error(&self) -> Option<&ToolError> {
        self.error.as_ref()
    }

    /// Text sent back to the model as the tool-result message body.
    ///
    /// String payloads are passed through verbatim; everything else is
    /// serialized as JSON. Errors become `{"error": {...}}` objects.
    pub fn to_message_content(&self) -> String {
        match (&self.payload, &self.error) {
            (_, Some(error)) => serde_json::json!({
                "error": {
                    "code": error.code(),
                    "message": error.to_string(),
                    "details": error,
                }
            })
            .to_string(),
            (Some(serde_json::Value::String(text)), None) => text.clone(),
            (Some(value), None) => value.to_string(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ToolError::not_found("foo").code(), "NOT_FOUND");
        assert_eq!(
            ToolError::timeout("slow", Duration::from_secs(2)).code(),
            "TIMEOUT"
        );
        assert_eq!(
            ToolError::ProtocolRpc {
                code: -32602,
                message: "bad params".into()
            }
            .code(),
            "PROTOCOL_RPC"
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = ToolError::timeout("slow", Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Tool 'slow' timed out after 1500ms");
    }

    #[test]
    fn test_auth_required_needs_user() {
        let err = ToolError::AuthRequired {
            provider: "google".into(),
            user: "u1".into(),
        };
        assert!(err.requires_user_action());
        assert!(!ToolError::execution("boom").requires_user_action());
    }

    #[test]
    fn test_error_serializes_with_kind_tag() {
        let value = serde_json::to_value(ToolError::not_found("foo")).unwrap();
        assert_eq!(value["kind"], "not_found");
        assert_eq!(value["name"], "foo");
    }

    #[test]
    fn test_success_message_content() {
        let text = ToolCallResult::success("c1", "echo", serde_json::json!("hello"));
        assert_eq!(text.to_message_content(), "hello");

        let number = ToolCallResult::success("c2", "calculator", serde_json::json!(12402));
        assert_eq!(number.to_message_content(), "12402");
        assert!(number.is_success());
    }

    #[test]
    fn test_failure_message_content() {
        let result = ToolCallResult::failure("c1", "foo", ToolError::not_found("foo"))
            .with_latency(Duration::from_millis(3));
        assert!(!result.is_success());
        assert_eq!(result.latency_ms, 3);

        let content: serde_json::Value =
            serde_json::from_str(&result.to_message_content()).unwrap();
        assert_eq!(content["error"]["code"], "NOT_FOUND");
        assert_eq!(content["error"]["details"]["kind"], "not_found");
    }
}
