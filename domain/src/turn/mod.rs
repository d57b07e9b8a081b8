//! Turn model: the states and result of one bounded agentic loop.

pub mod entities;

pub use entities::{TurnOutcome, TurnResult, TurnState};
