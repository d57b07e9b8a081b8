//! JSON-RPC message types for the remote capability protocol.
//!
//! - **Requests**: client → server (`initialize`, `tools/list`, `tools/call`)
//! - **Responses**: server → client, delivered as an event-stream `message`
//!   frame or as a plain JSON body

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};

/// Protocol revision announced in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const CLIENT_NAME: &str = "aion-mcp-client";
pub const CLIENT_VERSION: &str = "1.0.0";

/// Per-client request id sequence.
#[derive(Debug)]
pub struct RequestIds(AtomicU64);

impl RequestIds {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }

    pub fn initialize(id: u64) -> Self {
        Self::new(
            id,
            "initialize",
            Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": { "name": CLIENT_NAME, "version": CLIENT_VERSION },
            })),
        )
    }

    pub fn list_tools(id: u64) -> Self {
        Self::new(id, "tools/list", Some(json!({})))
    }

    pub fn call_tool(id: u64, name: &str, arguments: &Value) -> Self {
        Self::new(
            id,
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        )
    }

    pub fn to_value(&self) -> Value {
        // Serializing a struct of strings and JSON values cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// `tools/call` result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Text of all `text` content blocks, or `None` if any block is of
    /// another kind.
    pub fn text_only(&self) -> Option<String> {
        let mut parts = Vec::with_capacity(self.content.len());
        for block in &self.content {
            if block.get("type").and_then(Value::as_str) != Some("text") {
                return None;
            }
            parts.push(block.get("text").and_then(Value::as_str).unwrap_or_default());
        }
        Some(parts.join("\n"))
    }

    /// Convert to the value handed back to the model.
    ///
    /// Text content that is itself JSON is passed through as JSON.
    pub fn into_output(self) -> Value {
        match self.text_only() {
            Some(text) if !self.content.is_empty() => {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            }
            _ => json!({ "content": self.content }),
        }
    }
}

/// Tool as advertised by `tools/list`
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<RemoteToolSpec>,
}
