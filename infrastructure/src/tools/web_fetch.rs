//! Page reading tool: web_fetch
//!
//! GETs an http(s) URL and returns the readable text. HTML is reduced with
//! `scraper`: page chrome (`script`, `style`, `nav`, `header`, `footer`, ...)
//! is dropped and the first content container (`main`, `article`, ...) is
//! preferred over the whole body. Other text types are returned as-is.

use std::time::Duration;

use aion_domain::{
    ArgumentsExt, ParamType, ToolArguments, ToolContext, ToolContract, ToolDefinition, ToolError,
    ToolParameter,
};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::{Value, json};
use tracing::{info, warn};
use url::Url;

/// Tool name constant
pub const WEB_FETCH: &str = "web_fetch";

/// Request timeout for one page
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters of page text returned unless the model asks for fewer
pub const DEFAULT_MAX_CHARS: usize = 8000;

/// Largest body read before giving up (5 MB)
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

const USER_AGENT: &str = concat!("aion/", env!("CARGO_PKG_VERSION"), " (web_fetch tool)");

/// Subtrees that never carry page content.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "svg", "nav", "header", "footer", "template",
];

/// Content containers, most specific first.
const CONTENT_SELECTORS: &[&str] = &["main", "article", "[role=\"main\"]", ".content", "#content"];

pub struct WebFetchTool {
    definition: ToolDefinition,
    client: reqwest::Client,
    timeout: Duration,
    max_chars: usize,
}

impl WebFetchTool {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            definition: ToolDefinition::new(
                WEB_FETCH,
                "Fetch a web page and return its readable text. Use it to read the full content \
                 of a URL the user gave or one found earlier in the conversation.",
            )
            .with_parameter(ToolParameter::new(
                "url",
                "The http or https URL to fetch",
                true,
            ))
            .with_parameter(
                ToolParameter::new(
                    "max_chars",
                    "Maximum number of characters of page text to return (default: 8000)",
                    false,
                )
                .with_type(ParamType::Integer),
            ),
            client,
            timeout,
            max_chars: DEFAULT_MAX_CHARS,
        })
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }
}

#[async_trait]
impl ToolContract for WebFetchTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Network class: the request timeout plus time to parse the page.
    fn default_timeout(&self) -> Duration {
        self.timeout + Duration::from_secs(5)
    }

    async fn execute(&self, args: &ToolArguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let raw = args
            .require_string("url")
            .map_err(ToolError::invalid_argument)?;
        let url = parse_url(raw)?;
        let max_chars = args
            .get_i64("max_chars")
            .filter(|n| *n > 0)
            .map(|n| (n as usize).min(self.max_chars))
            .unwrap_or(self.max_chars);

        info!(url = %url, "Fetching page");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Page fetch failed");
            return Err(ToolError::execution_with_payload(
                format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("error")
                ),
                json!({"url": url.as_str(), "status": status.as_u16()}),
            ));
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_BODY_BYTES as u64)
        {
            return Err(ToolError::execution(format!(
                "Page too large (over {} bytes)",
                MAX_BODY_BYTES
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let body = response.bytes().await.map_err(|e| fetch_error(&url, e))?;
        if body.len() > MAX_BODY_BYTES {
            return Err(ToolError::execution(format!(
                "Page too large ({} bytes)",
                body.len()
            )));
        }
        let body = String::from_utf8_lossy(&body);

        let (title, text) = if is_html(&content_type, &body) {
            let page = extract_page(&body);
            (page.title, page.text)
        } else if content_type.is_empty()
            || content_type.starts_with("text/")
            || content_type.contains("json")
            || content_type.contains("xml")
        {
            (None, clean_lines(&body))
        } else {
            return Err(ToolError::execution(format!(
                "Unsupported content type '{}'",
                content_type
            )));
        };

        let total_chars = text.chars().count();
        let truncated = total_chars > max_chars;
        let content = if truncated {
            let cut: String = text.chars().take(max_chars).collect();
            format!("{}\n\n[content truncated]", cut)
        } else {
            text
        };

        info!(url = %url, chars = total_chars, truncated, "Page fetched");
        Ok(json!({
            "url": url.as_str(),
            "title": title,
            "content": content,
            "truncated": truncated,
        }))
    }
}

fn parse_url(raw: &str) -> Result<Url, ToolError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ToolError::invalid_argument(format!("Invalid URL '{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ToolError::invalid_argument(
            "URL must start with http:// or https://",
        ));
    }
    Ok(url)
}

fn fetch_error(url: &Url, error: reqwest::Error) -> ToolError {
    if error.is_timeout() {
        ToolError::execution(format!("Request to {} timed out", url))
    } else {
        ToolError::execution(format!("Failed to fetch {}: {}", url, error))
    }
}

fn is_html(content_type: &str, body: &str) -> bool {
    if content_type.contains("html") {
        return true;
    }
    let head = body.trim_start();
    content_type.is_empty()
        && (head.starts_with("<!DOCTYPE html")
            || head.starts_with("<!doctype html")
            || head.starts_with("<html"))
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Page {
    pub title: Option<String>,
    pub text: String,
}

pub(crate) fn extract_page(html: &str) -> Page {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|s| document.select(&s).next())
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let content_root = CONTENT_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|s| document.select(&s).next());
    let root = content_root
        .or_else(|| {
            Selector::parse("body")
                .ok()
                .and_then(|s| document.select(&s).next())
        })
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    collect_text(root, &mut lines);
    Page {
        title,
        text: lines.join("\n"),
    }
}

fn collect_text(element: ElementRef, lines: &mut Vec<String>) {
    if SKIP_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !line.is_empty() {
                    lines.push(line);
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, lines);
                }
            }
            _ => {}
        }
    }
}

/// Trim each line and drop blank ones.
fn clean_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
