//! Tool argument validation
//!
//! Pure checks run by the registry before a tool executes.

use super::entities::{ParamType, ToolArguments, ToolDefinition};

/// Validator for tool call arguments
pub trait ToolValidator {
    /// Validate an argument map against a tool definition
    fn validate(&self, args: &ToolArguments, definition: &ToolDefinition) -> Result<(), String>;
}

/// Default implementation of ToolValidator
///
/// Checks required parameters and declared enum values. Extra arguments are
/// tolerated: models routinely add hints the tool simply ignores.
#[derive(Debug, Clone, Default)]
pub struct DefaultToolValidator;

impl ToolValidator for DefaultToolValidator {
    fn validate(&self, args: &ToolArguments, definition: &ToolDefinition) -> Result<(), String> {
        for param in &definition.parameters {
            let value = args.get(&param.name);

            if param.required && value.is_none_or(|v| v.is_null()) {
                return Err(format!(
                    "Missing required parameter '{}' for tool '{}'",
                    param.name, definition.name
                ));
            }

            if let Some(allowed) = &param.enum_values
                && param.param_type == ParamType::String
                && let Some(given) = value.and_then(|v| v.as_str())
                && !allowed.iter().any(|a| a == given)
            {
                return Err(format!(
                    "Parameter '{}' for tool '{}' must be one of [{}], got '{}'",
                    param.name,
                    definition.name,
                    allowed.join(", "),
                    given
                ));
            }
        }

        Ok(())
    }
}
