//! Tool domain module
//!
//! Core abstractions of the **tool system**: how the model reaches
//! capabilities beyond text generation.
//!
//! ```text
//! ┌────────────────┐    ┌─────────────────┐    ┌────────────────┐
//! │ ToolDefinition │───▶│ ToolCallRequest │───▶│ ToolCallResult │
//! │ (schema)       │    │ (model request) │    │ (trace entry)  │
//! └────────────────┘    └─────────────────┘    └────────────────┘
//! ```
//!
//! - [`ToolContract`]: interface every tool implements
//! - [`ToolChoice`]: `auto` / `none` / `forced:<name>` policy for a turn
//! - [`ToolError`]: typed failure; crosses the dispatch boundary as data
//! - [`ToolValidator`]: pure argument validation
//!
//! The domain holds definitions only. Execution, timeouts and schema
//! rendering live in the infrastructure registry behind the application's
//! `ToolExecutorPort`.

pub mod choice;
pub mod contract;
pub mod entities;
pub mod traits;
pub mod value_objects;

pub use choice::ToolChoice;
pub use contract::{DEFAULT_TOOL_TIMEOUT, ToolContext, ToolContract};
pub use entities::{
    ArgumentsExt, ParamType, ToolArguments, ToolCallRequest, ToolDefinition, ToolParameter,
};
pub use traits::{DefaultToolValidator, ToolValidator};
pub use value_objects::{ToolCallResult, ToolError, ToolStatus};
