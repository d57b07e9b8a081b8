//! Conversation messages and model replies.
//!
//! - [`entities::Message`] / [`entities::Conversation`]: the history sent to the model
//! - [`response::LlmResponse`]: a structured reply (text and/or tool calls)

pub mod entities;
pub mod response;

pub use entities::{Conversation, Message, Role};
pub use response::{ContentBlock, LlmResponse, StopReason};
