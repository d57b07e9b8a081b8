//! Remote capability protocol: session lifecycle.
//!
//! The wire format (event-stream frames, JSON-RPC) lives in infrastructure;
//! this module only tracks what a session knows and which transitions are legal.

pub mod session;

pub use session::{ProtocolSession, SessionState};
