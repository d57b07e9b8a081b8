//! Remote tools: [`ToolContract`] adapters over protocol sessions.
//!
//! A tool `send_email` on server `gmail` is registered as `gmail__send_email`.
//! The session is picked per call from the [`SessionRegistry`] using the
//! calling user, so each user talks to the server through their own session
//! and credentials.

use std::sync::Arc;
use std::time::Duration;

use aion_domain::{
    ParamType, ToolArguments, ToolContext, ToolContract, ToolDefinition, ToolError, ToolParameter,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::error::Result as ProtocolResult;
use super::message::RemoteToolSpec;
use super::registry::SessionRegistry;

/// Separator between server and tool name in registered names.
pub const NAME_SEPARATOR: &str = "__";

pub struct RemoteTool {
    definition: ToolDefinition,
    server: String,
    remote_name: String,
    sessions: Arc<SessionRegistry>,
    timeout: Duration,
}

impl RemoteTool {
    pub fn new(
        server: &str,
        spec: &RemoteToolSpec,
        sessions: Arc<SessionRegistry>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            definition: definition_from_spec(server, spec),
            server: server.to_string(),
            remote_name: spec.name.clone(),
            sessions,
            // Room for one reconnect (handshake plus the replayed call).
            timeout: request_timeout * 2,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl ToolContract for RemoteTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, args: &ToolArguments, ctx: &ToolContext) -> Result<Value, ToolError> {
        let client = self
            .sessions
            .client_for(&self.server, ctx.user_id.as_deref())?;

        let arguments = serde_json::to_value(args)
            .map_err(|e| ToolError::invalid_argument(format!("arguments not serializable: {}", e)))?;

        debug!(server = %self.server, tool = %self.remote_name, "Calling remote tool");
        Ok(client.call_tool(&self.remote_name, &arguments).await?)
    }
}

/// Enumerate the tools of `server` as seen by `user_id`.
pub async fn discover(
    sessions: &Arc<SessionRegistry>,
    server: &str,
    user_id: Option<&str>,
) -> ProtocolResult<Vec<RemoteTool>> {
    let client = sessions.client_for(server, user_id)?;
    let specs = client.list_tools().await?;
    info!(server, count = specs.len(), "Discovered remote tools");

    Ok(specs
        .iter()
        .map(|spec| RemoteTool::new(server, spec, sessions.clone(), client.request_timeout()))
        .collect())
}

fn definition_from_spec(server: &str, spec: &RemoteToolSpec) -> ToolDefinition {
    let name = format!("{}{}{}", server, NAME_SEPARATOR, spec.name);
    let description = spec
        .description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("{} (via {})", spec.name, server));
    let mut definition = ToolDefinition::new(name, description);

    let Some(schema) = &spec.input_schema else {
        return definition;
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        // serde_json maps iterate in key order; parameters follow that order.
        for (param_name, prop) in properties {
            let description = prop
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let mut param =
                ToolParameter::new(param_name, description, required.contains(&param_name.as_str()))
                    .with_type(
                        prop.get("type")
                            .and_then(Value::as_str)
                            .map(ParamType::from_schema_type)
                            .unwrap_or_default(),
                    );
            if let Some(values) = prop.get("enum").and_then(Value::as_array) {
                param = param.with_enum(values.iter().filter_map(Value::as_str));
            }
            definition = definition.with_parameter(param);
        }
    }
    definition
}

#[cfg(test)]
mod tests {
    use super::super::client::RemoteServerSettings;
    use super::super::client::testing::ScriptedTransport;
    use super::*;
    use serde_json::json;

    fn spec() -> RemoteToolSpec {
        serde_json::from_value(json!({
            "name": "send_email",
            "description": "Send an email",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "to": {"type": "string", "description": "Recipient"},
                    "priority": {"type": "string", "enum": ["low", "high"]},
                    "retries": {"type": "integer"}
                },
                "required": ["to"]
            }
        }))
        .unwrap()
    }

    fn sessions(transport: Arc<ScriptedTransport>) -> Arc<SessionRegistry> {
        let mut registry = SessionRegistry::new();
        registry
            .add_server(
                RemoteServerSettings::new("gmail", "https://n8n.example.com/mcp/gmail/sse").unwrap(),
                transport,
            )
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_definition_from_input_schema() {
        let def = definition_from_spec("gmail", &spec());
        assert_eq!(def.name, "gmail__send_email");
        assert_eq!(def.description, "Send an email");

        let to = def.parameter("to").unwrap();
        assert!(to.required);
        assert_eq!(to.description, "Recipient");

        let priority = def.parameter("priority").unwrap();
        assert!(!priority.required);
        assert_eq!(
            priority.enum_values,
            Some(vec!["low".to_string(), "high".to_string()])
        );
        assert_eq!(def.parameter("retries").unwrap().param_type, ParamType::Integer);
    }

    #[test]
    fn test_definition_without_schema() {
        let bare: RemoteToolSpec = serde_json::from_value(json!({"name": "ping"})).unwrap();
        let def = definition_from_spec("ops", &bare);
        assert_eq!(def.name, "ops__ping");
        assert_eq!(def.description, "ping (via ops)");
        assert!(def.parameters.is_empty());
    }

    #[tokio::test]
    async fn test_discover_and_execute() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .result(json!({"tools": [spec()
                    .input_schema
                    .map(|schema| json!({"name": "send_email", "inputSchema": schema}))
                    .unwrap()]}))
                .text_result("queued"),
        );
        let sessions = sessions(transport.clone());

        let tools = discover(&sessions, "gmail", Some("alice")).await.unwrap();
        assert_eq!(tools.len(), 1);
        let tool = &tools[0];
        assert_eq!(tool.name(), "gmail__send_email");
        assert_eq!(tool.remote_name(), "send_email");
        assert_eq!(tool.default_timeout(), Duration::from_secs(60));

        let args: ToolArguments = [("to".to_string(), json!("bob@example.com"))].into();
        let out = tool
            .execute(&args, &ToolContext::for_user("alice"))
            .await
            .unwrap();
        assert_eq!(out, json!("queued"));

        let posts = transport.posts();
        assert_eq!(posts.last().unwrap().body["params"]["name"], "send_email");
        assert_eq!(
            posts.last().unwrap().body["params"]["arguments"]["to"],
            "bob@example.com"
        );
        // Discovery and the call share alice's session.
        assert_eq!(transport.stream_count(), 1);
    }

    #[tokio::test]
    async fn test_protocol_errors_map_to_tool_errors() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .result(json!({
                    "content": [{"type": "text", "text": "quota"}],
                    "isError": true
                })),
        );
        let tool = RemoteTool::new("gmail", &spec(), sessions(transport), Duration::from_secs(30));

        let err = tool
            .execute(&ToolArguments::new(), &ToolContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::ProtocolApplication("quota".into()));
    }
}
