//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid tool choice '{0}': expected auto, none or forced:<name>")]
    InvalidToolChoice(String),

    #[error("Invalid session transition from {from} to {to}")]
    InvalidSessionTransition { from: String, to: String },
}
