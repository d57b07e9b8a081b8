//! Port for structured conversation logging.
//!
//! [`ConversationLogger`] records turn events (model replies, tool calls,
//! tool results) to a machine-readable transcript. It is separate from
//! `tracing`: tracing carries diagnostics, this port carries the transcript.
//!
//! Payloads must never contain secrets; tool arguments are logged, bearer
//! tokens and API keys are not.

use serde_json::Value;

/// A structured conversation event.
pub struct ConversationEvent {
    /// Event type identifier (e.g., "model_reply", "tool_call", "turn_finished").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging conversation events.
///
/// Synchronous and infallible: a broken transcript must not break a turn.
pub trait ConversationLogger: Send + Sync {
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}
