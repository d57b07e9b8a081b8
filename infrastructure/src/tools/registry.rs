//! Tool Registry
//!
//! The [`ToolRegistry`] holds every [`ToolContract`] (local and
//! protocol-backed) by name and implements [`ToolExecutorPort`].
//!
//! # Usage
//!
//! ```ignore
//! use aion_infrastructure::tools::{Calculator, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Calculator::new())?;
//! registry.set_timeout("calculator", Duration::from_secs(2));
//!
//! let call = ToolCallRequest::new("call_1", "calculator").with_arg("expression", "2+2");
//! let result = registry.execute(&call, &ToolContext::default()).await;
//! ```
//!
//! # Dispatch boundary
//!
//! `execute` never fails. Unknown names, invalid arguments, tool errors,
//! timeouts and panics all come back as a [`ToolCallResult`] with
//! status=error, so the model sees failures as data.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use aion_application::ports::tool_executor::ToolExecutorPort;
use aion_application::ports::tool_schema::ToolSchemaPort;
use aion_domain::{
    DefaultToolValidator, ToolCallRequest, ToolCallResult, ToolChoice, ToolContext, ToolContract,
    ToolDefinition, ToolError, ToolValidator,
};
use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, warn};

use super::schema::FunctionSchemaConverter;

/// Configuration errors raised while building a registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateName(String),
}

/// Name-keyed tool map with per-tool timeout overrides.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolContract>>,
    /// Overrides of [`ToolContract::default_timeout`], from configuration
    timeouts: HashMap<String, Duration>,
    converter: Arc<dyn ToolSchemaPort>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeouts: HashMap::new(),
            converter: Arc::new(FunctionSchemaConverter),
        }
    }

    /// Register a tool; fails if its name is taken.
    pub fn register<T: ToolContract + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn ToolContract>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Override the per-call timeout of one tool.
    pub fn set_timeout(&mut self, name: impl Into<String>, timeout: Duration) {
        self.timeouts.insert(name.into(), timeout);
    }

    /// Pure lookup.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ToolContract>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::not_found(name))
    }

    /// Effective timeout: configured override, else the tool's own default.
    pub fn timeout_for(&self, tool: &dyn ToolContract) -> Duration {
        self.timeouts
            .get(tool.name())
            .copied()
            .unwrap_or_else(|| tool.default_timeout())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    async fn run(
        &self,
        tool: Arc<dyn ToolContract>,
        call: &ToolCallRequest,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError> {
        DefaultToolValidator
            .validate(&call.arguments, tool.definition())
            .map_err(ToolError::invalid_argument)?;

        let limit = self.timeout_for(tool.as_ref());
        let execution = AssertUnwindSafe(tool.execute(&call.arguments, ctx)).catch_unwind();

        match tokio::time::timeout(limit, execution).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(panic)) => Err(ToolError::execution(format!(
                "tool panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(ToolError::timeout(&call.tool_name, limit)),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[async_trait]
impl ToolExecutorPort for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition().clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    fn schema_for(&self, enabled: Option<&[String]>, choice: &ToolChoice) -> Vec<serde_json::Value> {
        if !choice.allows_tools() {
            return Vec::new();
        }

        let selected: Vec<&ToolDefinition> = self
            .tools
            .values()
            .map(|t| t.definition())
            .filter(|d| enabled.is_none_or(|names| names.iter().any(|n| *n == d.name)))
            .filter(|d| choice.forced_name().is_none_or(|forced| forced == d.name))
            .collect();

        self.converter.tools_schema(&selected)
    }

    async fn execute(&self, call: &ToolCallRequest, ctx: &ToolContext) -> ToolCallResult {
        let start = Instant::now();

        let outcome = match self.resolve(&call.tool_name) {
            Ok(tool) => self.run(tool, call, ctx).await,
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(payload) => ToolCallResult::success(&call.id, &call.tool_name, payload),
            Err(e) => {
                warn!(tool = %call.tool_name, code = e.code(), error = %e, "Tool call failed");
                ToolCallResult::failure(&call.id, &call.tool_name, e)
            }
        }
        .with_latency(start.elapsed());

        debug!(
            tool = %call.tool_name,
            request_id = %call.id,
            latency_ms = result.latency_ms,
            success = result.is_success(),
            "Tool call finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aion_domain::{ToolArguments, ToolParameter};
    use serde_json::{Value, json};

    struct EchoTool {
        definition: ToolDefinition,
    }

    impl EchoTool {
        fn new(name: &str) -> Self {
            Self {
                definition: ToolDefinition::new(name, "Echo the text argument")
                    .with_parameter(ToolParameter::new("text", "Text", true)),
            }
        }
    }

    #[async_trait]
    impl ToolContract for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, args: &ToolArguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
            Ok(args.get("text").cloned().unwrap_or(Value::Null))
        }
    }

    struct SleepyTool {
        definition: ToolDefinition,
    }

    #[async_trait]
    impl ToolContract for SleepyTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        fn default_timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn execute(&self, _args: &ToolArguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!("late"))
        }
    }

    struct PanickyTool {
        definition: ToolDefinition,
    }

    #[async_trait]
    impl ToolContract for PanickyTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, _args: &ToolArguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
            panic!("index out of range");
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new("echo")).unwrap();
        registry.register(EchoTool::new("shout")).unwrap();
        registry
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = registry();
        let err = registry.register(EchoTool::new("echo")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("echo".to_string()));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_resolve_is_a_lookup() {
        let registry = registry();
        assert_eq!(registry.resolve("echo").unwrap().name(), "echo");
        assert!(matches!(
            registry.resolve("foo"),
            Err(ToolError::NotFound { name }) if name == "foo"
        ));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_schema_for_modes() {
        let registry = registry();

        assert_eq!(registry.schema_for(None, &ToolChoice::Auto).len(), 2);
        assert!(registry.schema_for(None, &ToolChoice::None).is_empty());

        let forced = registry.schema_for(None, &ToolChoice::forced("shout"));
        assert_eq!(forced.len(), 1);
        assert_eq!(forced[0]["function"]["name"], "shout");

        let enabled = vec!["echo".to_string()];
        let filtered = registry.schema_for(Some(enabled.as_slice()), &ToolChoice::Auto);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["function"]["name"], "echo");

        // Forced tool outside the enabled set yields nothing.
        assert!(registry
            .schema_for(Some(enabled.as_slice()), &ToolChoice::forced("shout"))
            .is_empty());
    }

    #[test]
    fn test_definitions_sorted() {
        let names: Vec<String> = registry().definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["echo", "shout"]);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let call = ToolCallRequest::new("c1", "echo").with_arg("text", "hello");
        let result = registry().execute(&call, &ToolContext::default()).await;

        assert!(result.is_success());
        assert_eq!(result.request_id, "c1");
        assert_eq!(result.payload, Some(json!("hello")));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let call = ToolCallRequest::new("c1", "foo");
        let result = registry().execute(&call, &ToolContext::default()).await;

        assert!(!result.is_success());
        assert_eq!(result.error().map(|e| e.code()), Some("NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_execute_missing_argument() {
        let call = ToolCallRequest::new("c1", "echo");
        let result = registry().execute(&call, &ToolContext::default()).await;

        assert!(matches!(result.error(), Some(ToolError::InvalidArgument(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_times_out() {
        let mut registry = ToolRegistry::new();
        registry
            .register(SleepyTool {
                definition: ToolDefinition::new("sleepy", "Sleeps"),
            })
            .unwrap();

        let call = ToolCallRequest::new("c1", "sleepy");
        let result = registry.execute(&call, &ToolContext::default()).await;

        assert!(matches!(
            result.error(),
            Some(ToolError::Timeout { timeout_ms: 1000, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_override() {
        let mut registry = ToolRegistry::new();
        registry
            .register(SleepyTool {
                definition: ToolDefinition::new("sleepy", "Sleeps"),
            })
            .unwrap();
        registry.set_timeout("sleepy", Duration::from_millis(250));

        let tool = registry.resolve("sleepy").unwrap();
        assert_eq!(registry.timeout_for(tool.as_ref()), Duration::from_millis(250));

        let result = registry
            .execute(&ToolCallRequest::new("c1", "sleepy"), &ToolContext::default())
            .await;
        assert!(matches!(
            result.error(),
            Some(ToolError::Timeout { timeout_ms: 250, .. })
        ));
    }

    #[tokio::test]
    async fn test_panic_becomes_error_result() {
        let mut registry = ToolRegistry::new();
        registry
            .register(PanickyTool {
                definition: ToolDefinition::new("panicky", "Panics"),
            })
            .unwrap();

        let result = registry
            .execute(&ToolCallRequest::new("c1", "panicky"), &ToolContext::default())
            .await;

        match result.error() {
            Some(ToolError::Execution { message, .. }) => {
                assert!(message.contains("index out of range"))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
