//! Turn entities
//!
//! ```text
//!            ┌──────────── final answer ───────────┐
//!            │                                     ▼
//! ┌──────────┴─┐  tool calls  ┌─────────────┐   ┌──────────┐
//! │ Requesting │─────────────▶│ Dispatching │   │ Answered │
//! └────────────┘◀─────────────└──────┬──────┘   └──────────┘
//!                 round < max        │ round == max
//!                                    ▼
//!                              ┌───────────┐
//!                              │ Exhausted │
//!                              └───────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::tool::ToolCallResult;

/// State of the loop for one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Requesting,
    Dispatching,
    Answered,
    Exhausted,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Answered | TurnState::Exhausted)
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TurnState::Requesting => "requesting",
            TurnState::Dispatching => "dispatching",
            TurnState::Answered => "answered",
            TurnState::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The model produced a final answer.
    Answered,
    /// `max_iterations` dispatch rounds ran without a final answer.
    Exhausted { max_iterations: usize },
    /// The turn was cut short (wall-clock budget, cancellation, model failure).
    Incomplete { reason: String },
}

impl TurnOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, TurnOutcome::Answered)
    }
}

/// What a turn hands back to the caller.
///
/// Always carries an answer (possibly partial) and the full call trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub answer: String,
    pub outcome: TurnOutcome,
    /// Every tool call attempted during the turn, in request order.
    pub trace: Vec<ToolCallResult>,
    /// Number of completed dispatch rounds.
    pub rounds: usize,
}

impl TurnResult {
    pub fn failed_calls(&self) -> impl Iterator<Item = &ToolCallResult> {
        self.trace.iter().filter(|r| !r.is_success())
    }

    /// Errors the end user must act on (e.g. reconnecting an account).
    pub fn user_actions(&self) -> Vec<String> {
        self.trace
            .iter()
            .filter_map(|r| r.error())
            .filter(|e| e.requires_user_action())
            .map(|e| e.to_string())
            .collect()
    }
}
