//! Turn progress port.
//!
//! Output port the presentation layer implements to show what a turn is
//! doing. Every callback has a no-op default.

use aion_domain::{ToolCallRequest, ToolCallResult, TurnResult};

pub trait TurnProgressNotifier: Send + Sync {
    /// A model request is about to be sent (`round` is 0-based).
    fn on_model_request(&self, _round: usize, _tools_offered: usize) {}

    /// A dispatch round starts with `calls` requests.
    fn on_round_start(&self, _round: usize, _calls: usize) {}

    fn on_tool_call(&self, _call: &ToolCallRequest) {}

    fn on_tool_result(&self, _result: &ToolCallResult) {}

    fn on_turn_complete(&self, _result: &TurnResult) {}
}

/// Progress notifier that ignores everything.
pub struct NoTurnProgress;

impl TurnProgressNotifier for NoTurnProgress {}
