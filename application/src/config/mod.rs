//! Application-level configuration.
//!
//! - [`TurnParams`]: loop control for one turn (iteration bound, wall-clock budget)

pub mod turn_params;

pub use turn_params::TurnParams;
