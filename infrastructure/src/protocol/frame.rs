//! Event-stream frame parser.
//!
//! Incremental parser for `text/event-stream` bodies. Bytes go in as they
//! arrive; complete frames come out as typed [`Frame`] values.
//!
//! ```text
//! event: endpoint                       Frame::Endpoint("/mcp/x/messages?sessionId=abc123")
//! data: /mcp/x/messages?sessionId=abc123
//!
//! event: message                        Frame::Message("{\"jsonrpc\":\"2.0\",...}")
//! data: {"jsonrpc":"2.0",...}
//!
//! : keep-alive                          Frame::Comment("keep-alive")
//! ```
//!
//! Lines end with `\n`, `\r\n` or `\r`. Multiple `data:` lines of one event
//! are joined with `\n`. `id:` and `retry:` are accepted and ignored.

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `event: endpoint`: where to POST, carrying the provisional id.
    Endpoint(String),
    /// `event: message` or an unnamed event: a JSON-RPC payload.
    Message(String),
    Comment(String),
    Other { event: String, data: String },
}

#[derive(Debug, Default)]
pub struct FrameParser {
    /// Bytes of the current, not yet terminated line.
    line: Vec<u8>,
    /// A `\r` ended the previous line; swallow a following `\n`.
    after_cr: bool,
    event: Option<String>,
    data: Vec<String>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the frames it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &byte in chunk {
            match byte {
                b'\n' if self.after_cr => {
                    self.after_cr = false;
                }
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    let line = std::mem::take(&mut self.line);
                    self.process_line(&String::from_utf8_lossy(&line), &mut frames);
                }
                _ => {
                    self.after_cr = false;
                    self.line.push(byte);
                }
            }
        }
        frames
    }

    /// End of input: flush a trailing line and any pending event.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.process_line(&String::from_utf8_lossy(&line), &mut frames);
        }
        self.dispatch(&mut frames);
        frames
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<Frame>) {
        if line.is_empty() {
            self.dispatch(frames);
            return;
        }

        if let Some(comment) = line.strip_prefix(':') {
            frames.push(Frame::Comment(comment.trim_start().to_string()));
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self, frames: &mut Vec<Frame>) {
        let event = self.event.take();
        if self.data.is_empty() {
            return;
        }
        let data = std::mem::take(&mut self.data).join("\n");

        let frame = match event.as_deref() {
            Some("endpoint") => Frame::Endpoint(data),
            None | Some("") | Some("message") => Frame::Message(data),
            Some(other) => Frame::Other {
                event: other.to_string(),
                data,
            },
        };
        frames.push(frame);
    }
}

/// Parse a complete body.
pub fn parse_all(body: &[u8]) -> Vec<Frame> {
    let mut parser = FrameParser::new();
    let mut frames = parser.feed(body);
    frames.extend(parser.finish());
    frames
}

/// Provisional session id carried by an endpoint event
/// (`/mcp/x/messages?sessionId=abc123`).
pub fn endpoint_session_id(endpoint: &str) -> Option<String> {
    let base = Url::parse("http://endpoint.invalid/").ok()?;
    let url = base.join(endpoint.trim()).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "sessionId")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}
