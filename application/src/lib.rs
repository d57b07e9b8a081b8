//! Application layer for aion
//!
//! This crate contains the turn orchestration use case, port definitions,
//! and turn configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::TurnParams;
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    knowledge_search::{KnowledgeHit, KnowledgeSearchError, KnowledgeSearchPort},
    llm_gateway::{CompletionRequest, GatewayError, LlmGateway},
    tool_executor::ToolExecutorPort,
    tool_schema::ToolSchemaPort,
    turn_progress::{NoTurnProgress, TurnProgressNotifier},
};
pub use use_cases::run_turn::{RunTurnError, RunTurnInput, RunTurnUseCase};
