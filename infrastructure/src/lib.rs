//! Infrastructure layer for aion
//!
//! Adapters implementing the application ports: the tool registry and
//! built-in tools, remote capability sessions, the credential vault, the
//! model gateway, knowledge search, configuration loading and the
//! conversation transcript.

pub mod config;
pub mod gateway;
pub mod knowledge;
pub mod logging;
pub mod protocol;
pub mod tools;
pub mod vault;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigLoader, FileConfig, Severity};
pub use gateway::{GatewaySettings, OpenAiCompatibleGateway};
pub use knowledge::InMemoryKnowledgeIndex;
pub use logging::JsonlConversationLogger;
pub use protocol::{
    ProtocolError, ProtocolSessionClient, RemoteServerSettings, RemoteTool, ReqwestTransport,
    SessionRegistry,
};
pub use tools::{
    Calculator, CodeRunner, FunctionSchemaConverter, KnowledgeBaseTool, RegistryError,
    ToolRegistry, WebFetchTool,
};
pub use vault::{CredentialVault, JsonFileCredentialStore, VaultCipher, VaultError};
