//! Protocol session entity
//!
//! ```text
//! Disconnected ──connect──▶ AwaitingEndpoint ──endpoint──▶ Initializing ──initialized──▶ Ready
//!      ▲                          │                            │                          │
//!      │                          └────────────fail────────────┴───────────fail───────────┘
//!      │                                                       ▼
//!      └───────────────────────────reset──────────────────── Failed
//! ```
//!
//! Two identifiers are involved and must never be mixed: the *provisional*
//! id from the endpoint event (only used to address `initialize`) and the
//! *session token* the server returns from `initialize` (used on every
//! later call).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    AwaitingEndpoint,
    Initializing,
    Ready,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::AwaitingEndpoint => "awaiting_endpoint",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Session with one remote capability server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolSession {
    state: SessionState,
    provisional_id: Option<String>,
    session_token: Option<String>,
    last_activity: Option<DateTime<Utc>>,
}

impl Default for ProtocolSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            provisional_id: None,
            session_token: None,
            last_activity: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn provisional_id(&self) -> Option<&str> {
        self.provisional_id.as_deref()
    }

    /// Session token, only available once the handshake completed.
    pub fn session_token(&self) -> Option<&str> {
        if self.is_ready() {
            self.session_token.as_deref()
        } else {
            None
        }
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    fn transition(&mut self, allowed: &[SessionState], to: SessionState) -> Result<(), DomainError> {
        if !allowed.contains(&self.state) {
            return Err(DomainError::InvalidSessionTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        self.last_activity = Some(Utc::now());
        Ok(())
    }

    /// Start (or restart) the handshake. Clears any identifiers from a
    /// previous session.
    pub fn begin_connect(&mut self) -> Result<(), DomainError> {
        self.transition(
            &[SessionState::Disconnected, SessionState::Failed],
            SessionState::AwaitingEndpoint,
        )?;
        self.provisional_id = None;
        self.session_token = None;
        Ok(())
    }

    /// Endpoint event received with the provisional id.
    pub fn endpoint_received(&mut self, provisional_id: impl Into<String>) -> Result<(), DomainError> {
        self.transition(&[SessionState::AwaitingEndpoint], SessionState::Initializing)?;
        self.provisional_id = Some(provisional_id.into());
        Ok(())
    }

    /// `initialize` succeeded and returned the session token.
    pub fn initialized(&mut self, session_token: impl Into<String>) -> Result<(), DomainError> {
        self.transition(&[SessionState::Initializing], SessionState::Ready)?;
        self.session_token = Some(session_token.into());
        Ok(())
    }

    /// Any failure (malformed frame, transport, invalid session).
    pub fn fail(&mut self) {
        self.state = SessionState::Failed;
        self.session_token = None;
        self.last_activity = Some(Utc::now());
    }

    /// Drop everything and go back to `Disconnected`.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Record a successful exchange.
    pub fn touch(&mut self) {
        self.last_activity = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_handshake() {
        let mut session = ProtocolSession::new();
        assert_eq!(session.state(), SessionState::Disconnected);

        session.begin_connect().unwrap();
        assert_eq!(session.state(), SessionState::AwaitingEndpoint);

        session.endpoint_received("abc123").unwrap();
        assert_eq!(session.state(), SessionState::Initializing);
        assert_eq!(session.provisional_id(), Some("abc123"));
        assert_eq!(session.session_token(), None);

        session.initialized("xyz789").unwrap();
        assert!(session.is_ready());
        assert_eq!(session.session_token(), Some("xyz789"));
        assert!(session.last_activity().is_some());
    }

    #[test]
    fn test_initialize_requires_endpoint_first() {
        let mut session = ProtocolSession::new();
        session.begin_connect().unwrap();
        let err = session.initialized("xyz789").unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidSessionTransition {
                from: "awaiting_endpoint".into(),
                to: "ready".into()
            }
        );
    }

    #[test]
    fn test_failure_clears_token_and_allows_reconnect() {
        let mut session = ProtocolSession::new();
        session.begin_connect().unwrap();
        session.endpoint_received("abc").unwrap();
        session.initialized("tok").unwrap();

        session.fail();
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.session_token(), None);

        session.begin_connect().unwrap();
        assert_eq!(session.provisional_id(), None);
    }

    #[test]
    fn test_cannot_reconnect_while_ready() {
        let mut session = ProtocolSession::new();
        session.begin_connect().unwrap();
        session.endpoint_received("abc").unwrap();
        session.initialized("tok").unwrap();
        assert!(session.begin_connect().is_err());

        session.reset();
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
