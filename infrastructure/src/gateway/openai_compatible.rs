//! OpenAI-compatible chat-completions gateway.
//!
//! Works against any `/chat/completions` endpoint with native tool calling;
//! defaults target OpenRouter. The conversion between domain messages and
//! the wire format is kept in free functions so it can be tested without a
//! server.

use std::time::Duration;

use aion_application::ports::llm_gateway::{CompletionRequest, GatewayError, LlmGateway};
use aion_domain::util::truncate_str;
use aion_domain::{
    ContentBlock, LlmResponse, Message, Role, SecretString, StopReason, ToolArguments, ToolChoice,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest error body kept in a [`GatewayError`].
const ERROR_BODY_BYTES: usize = 512;

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl GatewaySettings {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

pub struct OpenAiCompatibleGateway {
    client: reqwest::Client,
    settings: GatewaySettings,
}

impl OpenAiCompatibleGateway {
    pub fn new(settings: GatewaySettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::ConnectionError(e.to_string()))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LlmGateway for OpenAiCompatibleGateway {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<LlmResponse, GatewayError> {
        let body = request_body(&self.settings, &request);
        debug!(
            model = %self.settings.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.settings.api_key.expose())
            .header("X-Title", "aion")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(map_reqwest_error)?;
        if !(200..300).contains(&status) {
            return Err(status_error(status, &text));
        }
        parse_response(&text)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::ConnectionError(e.without_url().to_string())
    } else {
        GatewayError::RequestFailed(e.without_url().to_string())
    }
}

fn status_error(status: u16, body: &str) -> GatewayError {
    let body = truncate_str(body, ERROR_BODY_BYTES).to_string();
    match status {
        401 | 403 => GatewayError::Unauthorized(body),
        429 => GatewayError::RateLimited(body),
        _ => GatewayError::RequestFailed(format!("HTTP {}: {}", status, body)),
    }
}

/// Build the JSON body for one request.
pub(crate) fn request_body(settings: &GatewaySettings, request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(wire_message).collect();
    let mut body = json!({
        "model": settings.model,
        "messages": messages,
    });

    if !request.tools.is_empty() {
        body["tools"] = Value::Array(request.tools.clone());
        body["tool_choice"] = wire_tool_choice(&request.tool_choice);
    }
    if let Some(temperature) = settings.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = settings.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    body
}

fn wire_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Forced(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

fn wire_message(message: &Message) -> Value {
    match message.role {
        Role::System => json!({"role": "system", "content": message.content}),
        Role::User => json!({"role": "user", "content": message.content}),
        Role::Assistant if message.tool_calls.is_empty() => {
            json!({"role": "assistant", "content": message.content})
        }
        Role::Assistant => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.tool_name,
                            // The API expects arguments as a JSON string.
                            "arguments": Value::Object(
                                call.arguments.clone().into_iter().collect()
                            ).to_string(),
                        }
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                json!(message.content)
            };
            json!({"role": "assistant", "content": content, "tool_calls": calls})
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    // Some upstreams send `"tool_calls": null` on plain answers.
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Parse a chat-completions reply into an [`LlmResponse`].
pub(crate) fn parse_response(body: &str) -> Result<LlmResponse, GatewayError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::MalformedResponse("response has no choices".to_string()))?;

    let mut content = Vec::new();
    if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
        content.push(ContentBlock::Text(text));
    }
    for call in choice.message.tool_calls.unwrap_or_default() {
        let input = parse_arguments(&call.function.name, &call.function.arguments);
        content.push(ContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }

    Ok(LlmResponse {
        content,
        stop_reason: choice
            .finish_reason
            .as_deref()
            .map(StopReason::from_finish_reason),
        model: parsed.model,
    })
}

/// Arguments arrive as a JSON string. Anything that is not an object is
/// passed on as no arguments; the registry's validation then reports what
/// is missing back to the model.
fn parse_arguments(tool: &str, raw: &str) -> ToolArguments {
    if raw.trim().is_empty() {
        return ToolArguments::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => {
            warn!(tool, "Model sent tool arguments that are not a JSON object");
            ToolArguments::new()
        }
    }
}
