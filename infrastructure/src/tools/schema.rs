//! OpenAI-style function schema converter.
//!
//! Default implementation of [`ToolSchemaPort`] producing the
//! chat-completions `tools` array entries:
//!
//! ```json
//! {"type": "function", "function": {"name": ..., "description": ..., "parameters": {...}}}
//! ```

use aion_application::ports::tool_schema::ToolSchemaPort;
use aion_domain::ToolDefinition;
use serde_json::{Map, Value, json};

/// Renders [`ToolDefinition`]s as function-calling JSON Schema.
pub struct FunctionSchemaConverter;

impl ToolSchemaPort for FunctionSchemaConverter {
    fn tool_to_schema(&self, tool: &ToolDefinition) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &tool.parameters {
            let mut prop = Map::new();
            prop.insert("type".to_string(), json!(param.param_type.as_str()));
            prop.insert("description".to_string(), json!(param.description));
            if let Some(values) = &param.enum_values {
                prop.insert("enum".to_string(), json!(values));
            }
            properties.insert(param.name.clone(), Value::Object(prop));

            if param.required {
                required.push(json!(param.name));
            }
        }

        json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        })
    }
}
