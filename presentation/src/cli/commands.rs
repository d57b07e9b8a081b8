//! CLI command definitions

use aion_domain::ToolChoice;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// How a command prints its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored when the terminal supports it
    #[default]
    Text,
    /// Machine-readable JSON on stdout
    Json,
}

/// CLI arguments for aion
#[derive(Parser, Debug)]
#[command(name = "aion")]
#[command(author, version, about = "Tool-using assistant turns from the command line")]
#[command(long_about = r#"
aion answers a question by letting a model call tools: a calculator, a
sandboxed Python runner, a knowledge-base search and any tools exposed by
configured remote capability servers.

Configuration is loaded from (highest priority first):
1. AION_* environment variables     e.g. AION_VAULT__ENCRYPTION_KEY
2. --config <path>                   Explicit config file
3. ./aion.toml or ./.aion.toml       Project-level config
4. ~/.config/aion/config.toml        Global config

Example:
  aion ask "What is 17.5% of 2,340?"
  aion ask --tool-choice forced:calculator "12 × (3 + 4)"
  aion ask --user alice "What is on my calendar tomorrow?"
  aion tools --output json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write diagnostics to this file (rotated daily)
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one turn: ask a question and let the model use tools
    Ask(AskArgs),

    /// List the tools the model can be offered
    Tools {
        /// Acting user (selects per-user remote sessions during discovery)
        #[arg(long, value_name = "ID")]
        user: Option<String>,

        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Manage stored account connections
    #[command(subcommand)]
    Credentials(CredentialsCommand),

    /// Inspect the effective configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question for the model
    pub question: String,

    /// Extra context placed before the question
    #[arg(long, value_name = "TEXT")]
    pub context: Option<String>,

    /// auto, none or forced:<tool> (default from configuration)
    #[arg(long, value_name = "MODE")]
    pub tool_choice: Option<ToolChoice>,

    /// Restrict the turn to these tools (repeatable)
    #[arg(long = "tool", value_name = "NAME")]
    pub tools: Vec<String>,

    /// Acting user; remote tools use this user's sessions and credentials
    #[arg(long, value_name = "ID")]
    pub user: Option<String>,

    /// Print every tool call of the turn
    #[arg(long)]
    pub trace: bool,

    #[arg(short, long, value_enum, default_value_t)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    /// Show the accounts a user has connected
    List {
        #[arg(long, value_name = "ID")]
        user: String,
    },

    /// Forget a connected account and close its remote sessions
    Disconnect {
        #[arg(long, value_name = "ID")]
        provider: String,

        #[arg(long, value_name = "ID")]
        user: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged configuration with secrets redacted
    Show,

    /// Show which configuration files are in use
    Sources,

    /// Report configuration problems; exits non-zero on errors
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_with_forced_choice() {
        let cli = Cli::try_parse_from([
            "aion",
            "-vv",
            "ask",
            "--tool-choice",
            "forced:calculator",
            "--tool",
            "calculator",
            "--tool",
            "code_runner",
            "--user",
            "alice",
            "What is 2+2?",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.question, "What is 2+2?");
        assert_eq!(args.tool_choice, Some(ToolChoice::forced("calculator")));
        assert_eq!(args.tools, vec!["calculator", "code_runner"]);
        assert_eq!(args.user.as_deref(), Some("alice"));
        assert_eq!(args.output, OutputFormat::Text);
    }

    #[test]
    fn test_invalid_tool_choice_rejected() {
        assert!(Cli::try_parse_from(["aion", "ask", "--tool-choice", "maybe", "hi"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["aion", "tools", "--output", "json", "--config", "x.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(
            cli.command,
            Command::Tools {
                output: OutputFormat::Json,
                ..
            }
        ));
    }

    #[test]
    fn test_credentials_disconnect() {
        let cli = Cli::try_parse_from([
            "aion",
            "credentials",
            "disconnect",
            "--provider",
            "google",
            "--user",
            "alice",
        ])
        .unwrap();
        match cli.command {
            Command::Credentials(CredentialsCommand::Disconnect { provider, user }) => {
                assert_eq!(provider, "google");
                assert_eq!(user, "alice");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
