//! Error types for the remote capability protocol

use aion_domain::{DomainError, ToolError};
use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Session rejected by server: {0}")]
    SessionInvalid(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("JSON-RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("Remote tool error: {0}")]
    Application(String),

    #[error("Authorization required for provider '{provider}' (user '{user}')")]
    AuthRequired { provider: String, user: String },

    #[error("Credential unavailable: {0}")]
    Credential(String),

    #[error("Invalid server configuration: {0}")]
    Config(String),
}

impl ProtocolError {
    /// Failures that invalidate the session and warrant one reconnect.
    ///
    /// Authorization problems, JSON-RPC errors and tool-level `isError`
    /// results are answers from a healthy session and are never retried.
    pub fn is_session_fault(&self) -> bool {
        match self {
            ProtocolError::Transport(_)
            | ProtocolError::MalformedFrame(_)
            | ProtocolError::SessionInvalid(_)
            | ProtocolError::Handshake(_) => true,
            ProtocolError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Reclassify a failure that happened while establishing the session.
    pub(crate) fn during_handshake(self) -> Self {
        match self {
            ProtocolError::Transport(msg)
            | ProtocolError::MalformedFrame(msg)
            | ProtocolError::SessionInvalid(msg) => ProtocolError::Handshake(msg),
            ProtocolError::HttpStatus { status, body } if status != 401 && status != 403 => {
                ProtocolError::Handshake(format!("HTTP {}: {}", status, body))
            }
            ProtocolError::Rpc { code, message } => {
                ProtocolError::Handshake(format!("initialize rejected ({}): {}", code, message))
            }
            other => other,
        }
    }
}

impl From<DomainError> for ProtocolError {
    fn from(e: DomainError) -> Self {
        ProtocolError::Handshake(e.to_string())
    }
}

impl From<reqwest::Error> for ProtocolError {
    fn from(e: reqwest::Error) -> Self {
        ProtocolError::Transport(e.to_string())
    }
}

impl From<ProtocolError> for ToolError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Transport(msg) => ToolError::ProtocolTransport(msg),
            ProtocolError::HttpStatus { status, body } => {
                ToolError::ProtocolTransport(format!("HTTP {}: {}", status, body))
            }
            ProtocolError::MalformedFrame(_)
            | ProtocolError::SessionInvalid(_)
            | ProtocolError::Handshake(_) => ToolError::ProtocolSession(e.to_string()),
            ProtocolError::Rpc { code, message } => ToolError::ProtocolRpc { code, message },
            ProtocolError::Application(msg) => ToolError::ProtocolApplication(msg),
            ProtocolError::AuthRequired { provider, user } => {
                ToolError::AuthRequired { provider, user }
            }
            ProtocolError::Credential(msg) | ProtocolError::Config(msg) => ToolError::execution(msg),
        }
    }
}
