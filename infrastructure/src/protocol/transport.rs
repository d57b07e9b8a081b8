//! HTTP transport for protocol sessions.
//!
//! [`SessionTransport`] is the seam between the session client and the
//! network: one call to open the event stream and read the endpoint event,
//! one call to POST a JSON-RPC message. Both take the calling server's
//! timeout, so one transport serves servers with different limits.
//! [`ReqwestTransport`] is the real implementation; tests script the trait
//! directly.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, trace};

use super::error::{ProtocolError, Result};
use super::frame::{Frame, FrameParser};

/// Status, headers and body of one POST.
#[derive(Debug, Clone, Default)]
pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// GET the event stream and return the data of the first `endpoint`
    /// event, waiting at most `timeout` for it.
    async fn open_stream(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<String>;

    /// POST a JSON-RPC message; `timeout` bounds the whole exchange.
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        timeout: Duration,
    ) -> Result<HttpReply>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// `connect_timeout` bounds TCP/TLS setup only; request timeouts come
    /// from each server's settings.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ProtocolError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ProtocolError::Config(format!("invalid header name '{}'", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ProtocolError::Config(format!("invalid value for header '{}'", name)))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[async_trait]
impl SessionTransport for ReqwestTransport {
    async fn open_stream(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<String> {
        let response = self
            .client
            .get(url)
            .headers(Self::header_map(headers)?)
            .header("Accept", "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProtocolError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let read_endpoint = async {
            let mut parser = FrameParser::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                for frame in parser.feed(&chunk) {
                    match frame {
                        Frame::Endpoint(data) => return Ok(data),
                        other => trace!(?other, "Skipping frame before endpoint"),
                    }
                }
            }
            for frame in parser.finish() {
                if let Frame::Endpoint(data) = frame {
                    return Ok(data);
                }
            }
            Err(ProtocolError::MalformedFrame(
                "event stream closed before an endpoint event".to_string(),
            ))
        };

        tokio::time::timeout(timeout, read_endpoint)
            .await
            .map_err(|_| {
                ProtocolError::Transport(format!(
                    "no endpoint event within {}s",
                    timeout.as_secs()
                ))
            })?
    }

    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        timeout: Duration,
    ) -> Result<HttpReply> {
        debug!(url, timeout_secs = timeout.as_secs(), "POST protocol message");
        let response = self
            .client
            .post(url)
            .headers(Self::header_map(headers)?)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpReply {
            status,
            headers,
            body,
        })
    }
}
