//! Remote capability protocol (JSON-RPC over event streams).
//!
//! ```text
//! RemoteTool ──▶ SessionRegistry ──▶ ProtocolSessionClient ──▶ SessionTransport
//!  (per name)     (server, user)       (handshake, retry)        (reqwest)
//! ```
//!
//! - [`frame`]: incremental event-stream parser
//! - [`message`]: JSON-RPC request/response types
//! - [`transport`]: HTTP seam and its reqwest implementation
//! - [`client`]: session state machine, one request in flight
//! - [`registry`]: lazily created clients keyed by (server, user)
//! - [`remote_tool`]: discovery and the `{server}__{tool}` adapters

pub mod client;
pub mod error;
pub mod frame;
pub mod message;
pub mod registry;
pub mod remote_tool;
pub mod transport;

pub use client::{
    BearerTokenSource, DEFAULT_AUTH_HEADER, ProtocolSessionClient, RemoteServerSettings,
    SESSION_HEADER,
};
pub use error::ProtocolError;
pub use frame::{Frame, FrameParser};
pub use registry::SessionRegistry;
pub use remote_tool::{RemoteTool, discover};
pub use transport::{HttpReply, ReqwestTransport, SessionTransport};
