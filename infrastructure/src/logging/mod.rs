//! Conversation transcript adapters.
//!
//! [`JsonlConversationLogger`] implements the
//! [`ConversationLogger`](aion_application::ConversationLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlConversationLogger;
