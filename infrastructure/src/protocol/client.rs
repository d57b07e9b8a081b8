//! Session client for one remote capability server.
//!
//! # Handshake
//!
//! ```text
//! GET  {base}/sse                          ← event: endpoint
//!                                            data: /…/messages?sessionId=abc123
//! POST {base}/messages?sessionId=abc123    initialize
//!                                          ← Mcp-Session-Id: xyz789
//! POST {base}/messages                     tools/call   (Mcp-Session-Id: xyz789)
//! ```
//!
//! The provisional id only ever addresses `initialize`. Every later request
//! carries the session token as a header and no query parameter.
//!
//! # Concurrency
//!
//! The session lock is held for the whole exchange, so a client never has
//! more than one request in flight; concurrent callers queue on the lock.
//!
//! # Failure handling
//!
//! A session fault ([`ProtocolError::is_session_fault`]) fails the session and
//! triggers one full handshake replay within the same call. A second fault is
//! returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use aion_domain::{ProtocolSession, SecretString, SessionState};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::error::{ProtocolError, Result};
use super::frame::{Frame, endpoint_session_id, parse_all};
use super::message::{
    CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, RemoteToolSpec, RequestIds,
};
use super::transport::{HttpReply, SessionTransport};

/// Header carrying the session token after `initialize`.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Default auth header name for capability servers.
pub const DEFAULT_AUTH_HEADER: &str = "X-API-Key";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC code some servers use for an unknown or expired session.
const INVALID_SESSION_CODE: i64 = -32001;

/// Connection settings for one remote server.
#[derive(Debug, Clone)]
pub struct RemoteServerSettings {
    pub name: String,
    base_url: String,
    pub auth_header_name: String,
    pub auth_header_value: Option<SecretString>,
    /// OAuth provider whose bearer token is attached to every request.
    pub credential_provider: Option<String>,
    pub timeout: Duration,
}

impl RemoteServerSettings {
    /// `base_url` may be given with or without the trailing `/sse`.
    pub fn new(name: impl Into<String>, base_url: &str) -> Result<Self> {
        let name = name.into();
        let trimmed = base_url.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix("/sse").unwrap_or(trimmed);

        let parsed = Url::parse(trimmed)
            .map_err(|e| ProtocolError::Config(format!("server '{}': invalid base URL: {}", name, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProtocolError::Config(format!(
                "server '{}': base URL must be http or https",
                name
            )));
        }

        Ok(Self {
            name,
            base_url: trimmed.to_string(),
            auth_header_name: DEFAULT_AUTH_HEADER.to_string(),
            auth_header_value: None,
            credential_provider: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_auth_header(mut self, name: impl Into<String>, value: SecretString) -> Self {
        self.auth_header_name = name.into();
        self.auth_header_value = Some(value);
        self
    }

    pub fn with_credential_provider(mut self, provider: impl Into<String>) -> Self {
        self.credential_provider = Some(provider.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn stream_url(&self) -> String {
        format!("{}/sse", self.base_url)
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.base_url)
    }
}

/// Source of per-user bearer tokens (implemented by the credential vault).
#[async_trait]
pub trait BearerTokenSource: Send + Sync {
    async fn bearer_token(&self, provider: &str, user_id: &str) -> Result<SecretString>;
}

pub struct ProtocolSessionClient {
    settings: RemoteServerSettings,
    user_id: Option<String>,
    transport: Arc<dyn SessionTransport>,
    credentials: Option<Arc<dyn BearerTokenSource>>,
    ids: RequestIds,
    session: Mutex<ProtocolSession>,
}

impl ProtocolSessionClient {
    pub fn new(settings: RemoteServerSettings, transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            settings,
            user_id: None,
            transport,
            credentials: None,
            ids: RequestIds::new(),
            session: Mutex::new(ProtocolSession::new()),
        }
    }

    pub fn for_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn BearerTokenSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn server_name(&self) -> &str {
        &self.settings.name
    }

    /// Per-request timeout configured for this server.
    pub fn request_timeout(&self) -> Duration {
        self.settings.timeout
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    pub async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>> {
        let result = self.rpc("tools/list", JsonRpcRequest::list_tools).await?;
        let listed: ListToolsResult = serde_json::from_value(result)
            .map_err(|e| ProtocolError::MalformedFrame(format!("tools/list result: {}", e)))?;
        Ok(listed.tools)
    }

    /// `tools/call`. An `isError` result becomes [`ProtocolError::Application`].
    pub async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Value> {
        let result = self
            .rpc("tools/call", |id| JsonRpcRequest::call_tool(id, name, arguments))
            .await?;
        let result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| ProtocolError::MalformedFrame(format!("tools/call result: {}", e)))?;

        if result.is_error {
            let message = result
                .text_only()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("tool '{}' reported an error", name));
            return Err(ProtocolError::Application(message));
        }
        Ok(result.into_output())
    }

    async fn rpc(&self, method: &str, build: impl Fn(u64) -> JsonRpcRequest) -> Result<Value> {
        let mut session = self.session.lock().await;

        // Credentials first: a missing authorization must not reach the server.
        let bearer = self.bearer_token().await?;
        let auth = self.auth_headers(bearer.as_ref());

        match self.attempt(&mut session, &auth, &build).await {
            Err(e) if e.is_session_fault() => {
                warn!(
                    server = %self.settings.name,
                    method,
                    error = %e,
                    "Session fault, reconnecting once"
                );
                self.attempt(&mut session, &auth, &build).await
            }
            other => other,
        }
    }

    async fn attempt(
        &self,
        session: &mut ProtocolSession,
        auth: &[(String, String)],
        build: &impl Fn(u64) -> JsonRpcRequest,
    ) -> Result<Value> {
        if !session.is_ready() {
            self.connect(session, auth).await?;
        }
        let token = session
            .session_token()
            .map(str::to_string)
            .ok_or_else(|| ProtocolError::SessionInvalid("session has no token".to_string()))?;

        let mut headers = self.post_headers(auth);
        headers.push((SESSION_HEADER.to_string(), token));

        let request = build(self.ids.next());
        debug!(server = %self.settings.name, method = %request.method, id = request.id, "Sending request");

        let outcome = async {
            let reply = self
                .transport
                .post(
                    &self.settings.messages_url(),
                    &headers,
                    &request.to_value(),
                    self.settings.timeout,
                )
                .await?;
            decode_reply(reply)
        }
        .await;

        match &outcome {
            Ok(_) => session.touch(),
            Err(e) if e.is_session_fault() => session.fail(),
            Err(_) => {}
        }
        outcome
    }

    async fn connect(&self, session: &mut ProtocolSession, auth: &[(String, String)]) -> Result<()> {
        if !matches!(
            session.state(),
            SessionState::Disconnected | SessionState::Failed
        ) {
            // A previous handshake was abandoned half-way.
            session.reset();
        }
        session.begin_connect()?;

        let handshake = async {
            let endpoint = self
                .transport
                .open_stream(&self.settings.stream_url(), auth, self.settings.timeout)
                .await?;
            let provisional = endpoint_session_id(&endpoint).ok_or_else(|| {
                ProtocolError::MalformedFrame(format!("endpoint event without sessionId: {}", endpoint))
            })?;
            session.endpoint_received(provisional.clone())?;

            let mut url = Url::parse(&self.settings.messages_url())
                .map_err(|e| ProtocolError::Config(e.to_string()))?;
            url.query_pairs_mut().append_pair("sessionId", &provisional);

            let request = JsonRpcRequest::initialize(self.ids.next());
            let reply = self
                .transport
                .post(
                    url.as_str(),
                    &self.post_headers(auth),
                    &request.to_value(),
                    self.settings.timeout,
                )
                .await?;
            let token = reply
                .header(SESSION_HEADER)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            decode_reply(reply)?;

            let token = token.ok_or_else(|| {
                ProtocolError::Handshake("initialize response carried no session header".to_string())
            })?;
            session.initialized(token)?;
            Ok::<(), ProtocolError>(())
        }
        .await;

        match handshake {
            Ok(()) => {
                info!(server = %self.settings.name, user = ?self.user_id, "Protocol session ready");
                Ok(())
            }
            Err(e) => {
                session.fail();
                Err(e.during_handshake())
            }
        }
    }

    async fn bearer_token(&self) -> Result<Option<SecretString>> {
        let Some(provider) = &self.settings.credential_provider else {
            return Ok(None);
        };
        let Some(credentials) = &self.credentials else {
            return Err(ProtocolError::Config(format!(
                "server '{}' needs provider '{}' credentials but no vault is configured",
                self.settings.name, provider
            )));
        };
        let Some(user_id) = &self.user_id else {
            return Err(ProtocolError::Credential(format!(
                "server '{}' needs a user credential but the call has no user",
                self.settings.name
            )));
        };
        credentials.bearer_token(provider, user_id).await.map(Some)
    }

    fn auth_headers(&self, bearer: Option<&SecretString>) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(2);
        if let Some(value) = &self.settings.auth_header_value {
            headers.push((
                self.settings.auth_header_name.clone(),
                value.expose().to_string(),
            ));
        }
        if let Some(token) = bearer {
            headers.push((
                "Authorization".to_string(),
                format!("Bearer {}", token.expose()),
            ));
        }
        headers
    }

    fn post_headers(&self, auth: &[(String, String)]) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (
                "Accept".to_string(),
                "application/json, text/event-stream".to_string(),
            ),
        ];
        headers.extend_from_slice(auth);
        headers
    }
}

/// Classify an HTTP reply and unwrap the JSON-RPC result.
fn decode_reply(reply: HttpReply) -> Result<Value> {
    let status = reply.status;
    match status {
        401 | 403 => {
            return Err(ProtocolError::HttpStatus {
                status,
                body: reply.body,
            });
        }
        400 | 404 => {
            return Err(ProtocolError::SessionInvalid(format!(
                "HTTP {}: {}",
                status, reply.body
            )));
        }
        _ if !reply.is_success() => {
            return Err(ProtocolError::HttpStatus {
                status,
                body: reply.body,
            });
        }
        _ => {}
    }

    let payload = json_payload(&reply.body)?;
    let response: JsonRpcResponse = serde_json::from_str(&payload)
        .map_err(|e| ProtocolError::MalformedFrame(format!("invalid JSON-RPC payload: {}", e)))?;

    if let Some(error) = response.error {
        if error.code == INVALID_SESSION_CODE {
            return Err(ProtocolError::SessionInvalid(error.message));
        }
        return Err(ProtocolError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

/// The JSON document in a reply body: either the body itself or the first
/// `message` frame of an event-stream body.
fn json_payload(body: &str) -> Result<String> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }
    parse_all(trimmed.as_bytes())
        .into_iter()
        .find_map(|frame| match frame {
            Frame::Message(data) => Some(data),
            _ => None,
        })
        .ok_or_else(|| {
            ProtocolError::MalformedFrame(format!(
                "no message frame in response body ({} bytes)",
                body.len()
            ))
        })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    pub struct RecordedPost {
        pub url: String,
        pub headers: Vec<(String, String)>,
        pub body: Value,
        pub timeout: Duration,
    }

    impl RecordedPost {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Transport that replays scripted endpoints and replies in order.
    #[derive(Default)]
    pub struct ScriptedTransport {
        endpoints: StdMutex<VecDeque<Result<String>>>,
        replies: StdMutex<VecDeque<Result<HttpReply>>>,
        pub posts: StdMutex<Vec<RecordedPost>>,
        pub streams: AtomicUsize,
        pub stream_timeouts: StdMutex<Vec<Duration>>,
        in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn endpoint(self, provisional_id: &str) -> Self {
            self.endpoints.lock().unwrap().push_back(Ok(format!(
                "/mcp/x/messages?sessionId={}",
                provisional_id
            )));
            self
        }

        pub fn stream_error(self, error: ProtocolError) -> Self {
            self.endpoints.lock().unwrap().push_back(Err(error));
            self
        }

        pub fn reply(self, reply: Result<HttpReply>) -> Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }

        /// Successful `initialize` issuing `token`.
        pub fn initialized(self, token: &str) -> Self {
            self.reply(Ok(sse(json!({
                "jsonrpc": "2.0", "id": 1,
                "result": {"protocolVersion": "2024-11-05", "capabilities": {}}
            }))
            .with_header("mcp-session-id", token)))
        }

        pub fn result(self, result: Value) -> Self {
            self.reply(Ok(sse(json!({"jsonrpc": "2.0", "id": 2, "result": result}))))
        }

        pub fn text_result(self, text: &str) -> Self {
            self.result(json!({"content": [{"type": "text", "text": text}]}))
        }

        pub fn posts(&self) -> Vec<RecordedPost> {
            self.posts.lock().unwrap().clone()
        }

        pub fn stream_count(&self) -> usize {
            self.streams.load(Ordering::SeqCst)
        }
    }

    pub fn sse(body: Value) -> HttpReply {
        HttpReply::new(200, format!("event: message\ndata: {}\n\n", body))
    }

    #[async_trait]
    impl SessionTransport for ScriptedTransport {
        async fn open_stream(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            timeout: Duration,
        ) -> Result<String> {
            self.streams.fetch_add(1, Ordering::SeqCst);
            self.stream_timeouts.lock().unwrap().push(timeout);
            self.endpoints
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProtocolError::Transport("no scripted endpoint".into())))
        }

        async fn post(
            &self,
            url: &str,
            headers: &[(String, String)],
            body: &Value,
            timeout: Duration,
        ) -> Result<HttpReply> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.posts.lock().unwrap().push(RecordedPost {
                url: url.to_string(),
                headers: headers.to_vec(),
                body: body.clone(),
                timeout,
            });
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProtocolError::Transport("no scripted reply".into())));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            reply
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use serde_json::json;

    fn settings() -> RemoteServerSettings {
        RemoteServerSettings::new("gmail", "https://n8n.example.com/mcp/gmail/sse")
            .unwrap()
            .with_auth_header(DEFAULT_AUTH_HEADER, SecretString::new("k-123"))
    }

    fn client(transport: Arc<ScriptedTransport>) -> ProtocolSessionClient {
        ProtocolSessionClient::new(settings(), transport)
    }

    #[test]
    fn test_base_url_normalization() {
        let s = RemoteServerSettings::new("a", "https://host/mcp/a/sse/").unwrap();
        assert_eq!(s.base_url(), "https://host/mcp/a");
        assert_eq!(s.stream_url(), "https://host/mcp/a/sse");
        assert_eq!(s.messages_url(), "https://host/mcp/a/messages");

        assert!(matches!(
            RemoteServerSettings::new("b", "not a url"),
            Err(ProtocolError::Config(_))
        ));
        assert!(RemoteServerSettings::new("c", "ftp://host/x").is_err());
    }

    #[tokio::test]
    async fn test_handshake_then_call_uses_session_header_only() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .text_result("{\"sent\": true}"),
        );
        let client = client(transport.clone());

        let out = client
            .call_tool("send_email", &json!({"to": "a@b.c"}))
            .await
            .unwrap();
        assert_eq!(out, json!({"sent": true}));
        assert_eq!(client.state().await, SessionState::Ready);

        let posts = transport.posts();
        assert_eq!(posts.len(), 2);

        let init = &posts[0];
        assert_eq!(
            init.url,
            "https://n8n.example.com/mcp/gmail/messages?sessionId=abc123"
        );
        assert_eq!(init.body["method"], "initialize");
        assert_eq!(init.header(SESSION_HEADER), None);
        assert_eq!(init.header("x-api-key"), Some("k-123"));
        assert_eq!(
            init.header("accept"),
            Some("application/json, text/event-stream")
        );

        let call = &posts[1];
        assert_eq!(call.url, "https://n8n.example.com/mcp/gmail/messages");
        assert!(!call.url.contains("sessionId"));
        assert_eq!(call.header(SESSION_HEADER), Some("xyz789"));
        assert_eq!(call.body["method"], "tools/call");
        assert_eq!(call.body["params"]["name"], "send_email");
        assert_ne!(call.body["id"], init.body["id"]);
    }

    #[tokio::test]
    async fn test_session_is_reused_across_calls() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .text_result("one")
                .text_result("two"),
        );
        let client = client(transport.clone());

        assert_eq!(client.call_tool("t", &json!({})).await.unwrap(), json!("one"));
        assert_eq!(client.call_tool("t", &json!({})).await.unwrap(), json!("two"));
        assert_eq!(transport.stream_count(), 1);
        assert_eq!(transport.posts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_request_in_flight_per_session() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_delay(Duration::from_millis(50))
                .endpoint("abc123")
                .initialized("xyz789")
                .text_result("a")
                .text_result("b")
                .text_result("c"),
        );
        let client = Arc::new(client(transport.clone()));

        let (first, second, third) = (json!({"n": 1}), json!({"n": 2}), json!({"n": 3}));
        let (a, b, c) = tokio::join!(
            client.call_tool("t", &first),
            client.call_tool("t", &second),
            client.call_tool("t", &third),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(
            transport
                .max_in_flight
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );
        assert_eq!(transport.stream_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_fault_reconnects_once() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .reply(Err(ProtocolError::Transport("connection reset".into())))
                .endpoint("def456")
                .initialized("uvw000")
                .text_result("ok"),
        );
        let client = client(transport.clone());

        assert_eq!(client.call_tool("t", &json!({})).await.unwrap(), json!("ok"));
        assert_eq!(transport.stream_count(), 2);

        // initialize, failed call, replayed initialize, replayed call
        let posts = transport.posts();
        assert_eq!(posts.len(), 4);
        assert_eq!(posts[1].header(SESSION_HEADER), Some("xyz789"));
        assert_eq!(posts[2].url, "https://n8n.example.com/mcp/gmail/messages?sessionId=def456");
        assert_eq!(posts[2].header(SESSION_HEADER), None);
        assert_eq!(posts[3].url, "https://n8n.example.com/mcp/gmail/messages");
        assert_eq!(posts[3].header(SESSION_HEADER), Some("uvw000"));
    }

    #[tokio::test]
    async fn test_second_consecutive_fault_surfaces() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .reply(Ok(HttpReply::new(200, "data: {not json")))
                .stream_error(ProtocolError::Transport("refused".into())),
        );
        let client = client(transport.clone());

        let err = client.call_tool("t", &json!({})).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Handshake(_)));
        assert_eq!(transport.stream_count(), 2);
        assert_eq!(client.state().await, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_invalid_session_error_triggers_reconnect() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .reply(Ok(sse(json!({
                    "jsonrpc": "2.0", "id": 2,
                    "error": {"code": -32001, "message": "Session not found"}
                }))))
                .endpoint("def456")
                .initialized("uvw000")
                .text_result("ok"),
        );
        let client = client(transport.clone());

        assert!(client.call_tool("t", &json!({})).await.is_ok());
        assert_eq!(transport.stream_count(), 2);
    }

    #[tokio::test]
    async fn test_rpc_error_is_not_retried() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .reply(Ok(sse(json!({
                    "jsonrpc": "2.0", "id": 2,
                    "error": {"code": -32602, "message": "Invalid params"}
                })))),
        );
        let client = client(transport.clone());

        let err = client.call_tool("t", &json!({})).await.unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Rpc {
                code: -32602,
                message: "Invalid params".into()
            }
        );
        assert_eq!(transport.stream_count(), 1);
        assert_eq!(client.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn test_rpc_error_mentioning_session_is_not_retried() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .reply(Ok(sse(json!({
                    "jsonrpc": "2.0", "id": 2,
                    "error": {"code": -32000, "message": "Calendar session for room 4 is full"}
                })))),
        );
        let client = client(transport.clone());

        let err = client.call_tool("book_room", &json!({})).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Rpc { code: -32000, .. }));
        assert_eq!(transport.stream_count(), 1);
        assert_eq!(transport.posts().len(), 2);
    }

    #[tokio::test]
    async fn test_server_timeout_reaches_every_request() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .text_result("ok"),
        );
        let client = ProtocolSessionClient::new(
            settings().with_timeout(Duration::from_secs(120)),
            transport.clone(),
        );

        client.call_tool("slow_report", &json!({})).await.unwrap();
        assert_eq!(
            *transport.stream_timeouts.lock().unwrap(),
            vec![Duration::from_secs(120)]
        );
        assert!(
            transport
                .posts()
                .iter()
                .all(|p| p.timeout == Duration::from_secs(120))
        );
    }

    #[tokio::test]
    async fn test_is_error_result_is_application_error() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .result(json!({
                    "content": [{"type": "text", "text": "Mailbox quota exceeded"}],
                    "isError": true
                })),
        );
        let client = client(transport);

        let err = client.call_tool("send_email", &json!({})).await.unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Application("Mailbox quota exceeded".into())
        );
    }

    #[tokio::test]
    async fn test_plain_json_body_is_accepted() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .reply(Ok(HttpReply::new(
                    200,
                    r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"search","inputSchema":{"type":"object"}}]}}"#,
                ))),
        );
        let client = client(transport);

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "search");
    }

    #[tokio::test]
    async fn test_unauthorized_handshake_is_not_retried() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .reply(Ok(HttpReply::new(401, "invalid api key"))),
        );
        let client = client(transport.clone());

        let err = client.call_tool("t", &json!({})).await.unwrap_err();
        assert!(matches!(err, ProtocolError::HttpStatus { status: 401, .. }));
        assert_eq!(transport.stream_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_session_header_fails_handshake() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .reply(Ok(sse(json!({"jsonrpc": "2.0", "id": 1, "result": {}}))))
                .endpoint("abc124")
                .reply(Ok(sse(json!({"jsonrpc": "2.0", "id": 3, "result": {}})))),
        );
        let client = client(transport);

        let err = client.call_tool("t", &json!({})).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Handshake(msg) if msg.contains("session header")));
    }

    struct DenyingSource;

    #[async_trait]
    impl BearerTokenSource for DenyingSource {
        async fn bearer_token(&self, provider: &str, user_id: &str) -> Result<SecretString> {
            Err(ProtocolError::AuthRequired {
                provider: provider.into(),
                user: user_id.into(),
            })
        }
    }

    struct FixedSource;

    #[async_trait]
    impl BearerTokenSource for FixedSource {
        async fn bearer_token(&self, _provider: &str, _user_id: &str) -> Result<SecretString> {
            Ok(SecretString::new("ya29.token"))
        }
    }

    #[tokio::test]
    async fn test_auth_required_makes_no_request() {
        let transport = Arc::new(ScriptedTransport::new().endpoint("abc123"));
        let client = ProtocolSessionClient::new(
            settings().with_credential_provider("google"),
            transport.clone(),
        )
        .for_user(Some("u1".into()))
        .with_credentials(Arc::new(DenyingSource));

        let err = client.call_tool("t", &json!({})).await.unwrap_err();
        assert_eq!(
            err,
            ProtocolError::AuthRequired {
                provider: "google".into(),
                user: "u1".into()
            }
        );
        assert_eq!(transport.stream_count(), 0);
        assert!(transport.posts().is_empty());
    }

    #[tokio::test]
    async fn test_bearer_token_is_attached() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .endpoint("abc123")
                .initialized("xyz789")
                .text_result("ok"),
        );
        let client = ProtocolSessionClient::new(
            settings().with_credential_provider("google"),
            transport.clone(),
        )
        .for_user(Some("u1".into()))
        .with_credentials(Arc::new(FixedSource));

        client.call_tool("t", &json!({})).await.unwrap();
        assert!(
            transport
                .posts()
                .iter()
                .all(|p| p.header("authorization") == Some("Bearer ya29.token"))
        );
    }

    #[tokio::test]
    async fn test_credential_provider_without_user_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = ProtocolSessionClient::new(
            settings().with_credential_provider("google"),
            transport,
        )
        .with_credentials(Arc::new(FixedSource));

        let err = client.call_tool("t", &json!({})).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Credential(_)));
    }
}
