//! Console output for turn results and tool listings

use aion_domain::{ToolCallResult, ToolDefinition, TurnOutcome, TurnResult};
use colored::Colorize;
use serde_json::json;

/// Longest payload preview shown per trace line.
const PREVIEW_CHARS: usize = 120;

/// Formats turn results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Answer first; outcome notice, trace and required user actions below it.
    pub fn format_turn(result: &TurnResult, show_trace: bool) -> String {
        let mut output = String::new();
        output.push_str(result.answer.trim_end());
        output.push('\n');

        match &result.outcome {
            TurnOutcome::Answered => {}
            TurnOutcome::Exhausted { max_iterations } => {
                output.push_str(&format!(
                    "\n{} stopped after {} tool rounds without a final answer\n",
                    "!".yellow().bold(),
                    max_iterations
                ));
            }
            TurnOutcome::Incomplete { reason } => {
                output.push_str(&format!(
                    "\n{} incomplete: {}\n",
                    "!".yellow().bold(),
                    reason
                ));
            }
        }

        if show_trace && !result.trace.is_empty() {
            output.push_str(&Self::section_header(&format!(
                "Tool calls ({} in {} rounds)",
                result.trace.len(),
                result.rounds
            )));
            for call in &result.trace {
                output.push_str(&Self::trace_line(call));
                output.push('\n');
            }
        }

        let actions = result.user_actions();
        if !actions.is_empty() {
            output.push_str(&format!("\n{}\n", "Action required:".red().bold()));
            for action in actions {
                output.push_str(&format!("  * {}\n", action));
            }
        }

        output
    }

    pub fn trace_line(call: &ToolCallResult) -> String {
        let timing = format!("({}ms)", call.latency_ms).dimmed();
        match call.error() {
            None => {
                let preview = call
                    .payload
                    .as_ref()
                    .map(|p| Self::preview(&p.to_string()))
                    .unwrap_or_default();
                format!(
                    "  {} {} {} {}",
                    "v".green(),
                    call.tool_name.bold(),
                    timing,
                    preview.dimmed()
                )
            }
            Some(error) => format!(
                "  {} {} {} [{}] {}",
                "x".red(),
                call.tool_name.bold(),
                timing,
                error.code().red(),
                error
            ),
        }
    }

    pub fn format_json(result: &TurnResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn format_tools(definitions: &[ToolDefinition]) -> String {
        let mut output = Self::section_header(&format!("Tools ({})", definitions.len()));
        for definition in definitions {
            output.push_str(&format!("\n{}\n", definition.name.cyan().bold()));
            output.push_str(&Self::indent(&definition.description, "  "));
            output.push('\n');
            for param in &definition.parameters {
                let marker = if param.required {
                    "required".yellow()
                } else {
                    "optional".dimmed()
                };
                let choices = param
                    .enum_values
                    .as_ref()
                    .map(|v| format!(" one of: {}", v.join(", ")))
                    .unwrap_or_default();
                output.push_str(&format!(
                    "    - {} ({}, {}) {}{}\n",
                    param.name.bold(),
                    param.param_type.as_str(),
                    marker,
                    param.description,
                    choices
                ));
            }
        }
        output
    }

    pub fn format_tools_json(definitions: &[ToolDefinition]) -> String {
        serde_json::to_string_pretty(&json!({ "tools": definitions }))
            .unwrap_or_else(|_| "{}".to_string())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn preview(text: &str) -> String {
        if text.chars().count() <= PREVIEW_CHARS {
            text.to_string()
        } else {
            let cut: String = text.chars().take(PREVIEW_CHARS).collect();
            format!("{}...", cut)
        }
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aion_domain::{ToolError, ToolParameter};
    use std::time::Duration;

    fn plain() {
        colored::control::set_override(false);
    }

    fn result_with_trace() -> TurnResult {
        TurnResult {
            answer: "It is 4.".to_string(),
            outcome: TurnOutcome::Answered,
            trace: vec![
                ToolCallResult::success("c1", "calculator", json!({"result": 4}))
                    .with_latency(Duration::from_millis(3)),
                ToolCallResult::failure(
                    "c2",
                    "calendar__list_events",
                    ToolError::AuthRequired {
                        provider: "google".into(),
                        user: "alice".into(),
                    },
                ),
            ],
            rounds: 1,
        }
    }

    #[test]
    fn test_answer_with_trace_and_actions() {
        plain();
        let text = ConsoleFormatter::format_turn(&result_with_trace(), true);
        assert!(text.starts_with("It is 4.\n"));
        assert!(text.contains("Tool calls (2 in 1 rounds)"));
        assert!(text.contains("v calculator (3ms)"));
        assert!(text.contains("[AUTH_REQUIRED]"));
        assert!(text.contains("Action required:"));
    }

    #[test]
    fn test_trace_hidden_by_default() {
        plain();
        let text = ConsoleFormatter::format_turn(&result_with_trace(), false);
        assert!(!text.contains("Tool calls"));
        // User actions are shown regardless.
        assert!(text.contains("reconnect"));
    }

    #[test]
    fn test_exhausted_notice() {
        plain();
        let result = TurnResult {
            answer: "Partial.".into(),
            outcome: TurnOutcome::Exhausted { max_iterations: 5 },
            trace: vec![],
            rounds: 5,
        };
        let text = ConsoleFormatter::format_turn(&result, true);
        assert!(text.contains("stopped after 5 tool rounds"));
    }

    #[test]
    fn test_json_round_trips_outcome() {
        let value: serde_json::Value =
            serde_json::from_str(&ConsoleFormatter::format_json(&result_with_trace())).unwrap();
        assert_eq!(value["outcome"]["outcome"], "answered");
        assert_eq!(value["trace"][1]["error"]["kind"], "auth_required");
    }

    #[test]
    fn test_tool_listing() {
        plain();
        let tools = vec![
            ToolDefinition::new("calculator", "Evaluate arithmetic")
                .with_parameter(ToolParameter::new("expression", "Expression", true)),
        ];
        let text = ConsoleFormatter::format_tools(&tools);
        assert!(text.contains("Tools (1)"));
        assert!(text.contains("- expression (string, required) Expression"));
    }
}
