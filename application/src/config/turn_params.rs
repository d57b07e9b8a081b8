//! Turn parameters: loop control for [`RunTurnUseCase`](crate::use_cases::run_turn::RunTurnUseCase).

use aion_domain::ToolChoice;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on dispatch rounds per turn.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Default wall-clock budget for a whole turn.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnParams {
    /// Dispatch rounds allowed before the turn ends as `Exhausted`.
    pub max_iterations: usize,
    /// Overall budget; on expiry the turn returns a partial answer.
    pub turn_timeout: Duration,
    /// Tool-choice mode used when the caller does not set one.
    pub default_tool_choice: ToolChoice,
}

impl Default for TurnParams {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            default_tool_choice: ToolChoice::Auto,
        }
    }
}

impl TurnParams {
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn with_default_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.default_tool_choice = choice;
        self
    }
}
