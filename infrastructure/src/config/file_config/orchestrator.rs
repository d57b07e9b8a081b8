//! `[orchestrator]` section.

use std::time::Duration;

use aion_application::TurnParams;
use aion_application::config::turn_params::{DEFAULT_MAX_ITERATIONS, DEFAULT_TURN_TIMEOUT};
use aion_domain::ToolChoice;
use serde::{Deserialize, Serialize};

use crate::config::issue::{ConfigIssue, ConfigIssueCode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOrchestratorConfig {
    /// Dispatch rounds per turn before the turn is flagged as exhausted
    pub max_iterations: usize,
    /// Wall-clock budget for one turn
    pub turn_timeout_secs: u64,
    /// `auto`, `none` or `forced:<tool>`
    pub default_tool_choice: String,
}

impl Default for FileOrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            turn_timeout_secs: DEFAULT_TURN_TIMEOUT.as_secs(),
            default_tool_choice: "auto".to_string(),
        }
    }
}

impl FileOrchestratorConfig {
    pub fn parse_tool_choice(&self) -> (ToolChoice, Vec<ConfigIssue>) {
        match self.default_tool_choice.parse::<ToolChoice>() {
            Ok(choice) => (choice, Vec::new()),
            Err(_) => (
                ToolChoice::Auto,
                vec![ConfigIssue::error(
                    ConfigIssueCode::InvalidToolChoice {
                        value: self.default_tool_choice.clone(),
                    },
                    format!(
                        "orchestrator.default_tool_choice: '{}' is not auto, none or forced:<tool>",
                        self.default_tool_choice
                    ),
                )],
            ),
        }
    }

    /// Turn parameters, with invalid values replaced by defaults.
    pub fn to_turn_params(&self) -> (TurnParams, Vec<ConfigIssue>) {
        let (choice, mut issues) = self.parse_tool_choice();
        let mut params = TurnParams::default().with_default_tool_choice(choice);

        if self.max_iterations == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidValue {
                    field: "orchestrator.max_iterations".to_string(),
                    value: "0".to_string(),
                },
                "orchestrator.max_iterations must be at least 1",
            ));
        } else {
            params = params.with_max_iterations(self.max_iterations);
        }

        if self.turn_timeout_secs == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidValue {
                    field: "orchestrator.turn_timeout_secs".to_string(),
                    value: "0".to_string(),
                },
                format!(
                    "orchestrator.turn_timeout_secs is 0, using {}s",
                    DEFAULT_TURN_TIMEOUT.as_secs()
                ),
            ));
        } else {
            params = params.with_turn_timeout(Duration::from_secs(self.turn_timeout_secs));
        }

        (params, issues)
    }
}
