//! Domain layer for aion
//!
//! Pure types for the tool orchestration engine. No I/O, no async runtime,
//! no knowledge of HTTP or storage.
//!
//! # Core Concepts
//!
//! ## Tools
//!
//! A tool is a named, schema-described capability the model may request.
//! Every tool implements [`ToolContract`]; failures are typed
//! [`ToolError`] values that travel back to the model as data.
//!
//! ## Turns
//!
//! One user message drives a bounded loop of model requests and tool
//! dispatch rounds. A turn always ends with a [`TurnResult`]: an answer
//! (possibly partial) and the complete [`ToolCallResult`] trace.
//!
//! ## Protocol sessions and credentials
//!
//! Remote tools reach capability servers through a [`ProtocolSession`];
//! servers that need end-user authorization use an [`OAuthCredential`]
//! kept by the vault.

pub mod conversation;
pub mod core;
pub mod credential;
pub mod protocol;
pub mod tool;
pub mod turn;
pub mod util;

// Re-export commonly used types
pub use conversation::{ContentBlock, Conversation, LlmResponse, Message, Role, StopReason};
pub use core::error::DomainError;
pub use credential::{
    CredentialKey, OAuthCredential, ProviderProfile, SealedSecret, SecretString, TokenSet,
};
pub use protocol::{ProtocolSession, SessionState};
pub use tool::{
    ArgumentsExt, DEFAULT_TOOL_TIMEOUT, DefaultToolValidator, ParamType, ToolArguments,
    ToolCallRequest, ToolCallResult, ToolChoice, ToolContext, ToolContract, ToolDefinition,
    ToolError, ToolParameter, ToolStatus, ToolValidator,
};
pub use turn::{TurnOutcome, TurnResult, TurnState};
