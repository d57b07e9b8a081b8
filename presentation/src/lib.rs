//! Presentation layer for aion
//!
//! This crate contains the CLI definitions, the console formatter for turn
//! results and tool listings, and progress reporters.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{
    AskArgs, Cli, Command, ConfigCommand, CredentialsCommand, OutputFormat,
};
pub use output::console::ConsoleFormatter;
pub use progress::reporter::{SimpleTurnProgress, TurnProgressReporter};
