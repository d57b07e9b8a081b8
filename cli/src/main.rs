//! CLI entrypoint for aion
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod logging;
mod wiring;

use std::sync::Arc;

use aion_application::{
    NoTurnProgress, RunTurnInput, RunTurnUseCase, ToolExecutorPort, TurnProgressNotifier,
};
use aion_infrastructure::{ConfigLoader, FileConfig, Severity};
use aion_presentation::{
    AskArgs, Cli, Command, ConfigCommand, ConsoleFormatter, CredentialsCommand, OutputFormat,
    SimpleTurnProgress, TurnProgressReporter,
};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("failed to load configuration")?
    };

    match cli.command {
        Command::Config(command) => run_config(command, &config, cli.config.as_ref()),
        Command::Ask(args) => {
            check_config(&config)?;
            run_ask(args, &config, cli.quiet).await
        }
        Command::Tools { user, output } => {
            check_config(&config)?;
            run_tools(&config, user.as_deref(), output).await
        }
        Command::Credentials(command) => {
            check_config(&config)?;
            run_credentials(command, &config).await
        }
    }
}

/// Log warnings; refuse to run with configuration errors.
fn check_config(config: &FileConfig) -> Result<()> {
    let issues = config.validate();
    for issue in issues.iter().filter(|i| i.severity == Severity::Warning) {
        warn!("{}", issue.message);
    }
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.is_error())
        .map(|i| i.message.clone())
        .collect();
    if !errors.is_empty() {
        bail!("invalid configuration:\n  {}", errors.join("\n  "));
    }
    Ok(())
}

async fn run_ask(args: AskArgs, config: &FileConfig, quiet: bool) -> Result<()> {
    info!("Starting turn");

    let vault = wiring::vault(config)?;
    let sessions = wiring::sessions(config, vault.as_ref())?;
    let tools = wiring::tools(config, &sessions, args.user.as_deref()).await?;
    let gateway = wiring::gateway(config)?;
    let (params, _) = config.orchestrator.to_turn_params();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let use_case = RunTurnUseCase::new(Arc::new(gateway), Arc::new(tools))
        .with_params(params)
        .with_cancellation(cancel)
        .with_conversation_logger(wiring::conversation_logger(config));

    let mut input = RunTurnInput::new(args.question);
    if let Some(context) = args.context {
        input = input.with_context(context);
    }
    if let Some(choice) = args.tool_choice {
        input = input.with_tool_choice(choice);
    }
    if !args.tools.is_empty() {
        input = input.with_enabled_tools(args.tools);
    } else if let Some(enabled) = config.tools.enabled_tools() {
        input = input.with_enabled_tools(enabled.iter().cloned());
    }
    if let Some(user) = args.user {
        input = input.for_user(user);
    }

    let progress: Box<dyn TurnProgressNotifier> = if quiet || args.output == OutputFormat::Json {
        Box::new(NoTurnProgress)
    } else if std::io::stderr().is_terminal() {
        Box::new(TurnProgressReporter::new())
    } else {
        Box::new(SimpleTurnProgress)
    };

    let result = use_case.execute_with_progress(input, progress.as_ref()).await?;

    let output = match args.output {
        OutputFormat::Text => ConsoleFormatter::format_turn(&result, args.trace),
        OutputFormat::Json => ConsoleFormatter::format_json(&result),
    };
    println!("{}", output);
    Ok(())
}

async fn run_tools(config: &FileConfig, user: Option<&str>, output: OutputFormat) -> Result<()> {
    let vault = wiring::vault(config)?;
    let sessions = wiring::sessions(config, vault.as_ref())?;
    let tools = wiring::tools(config, &sessions, user).await?;

    let mut definitions = tools.definitions();
    definitions.sort_by(|a, b| a.name.cmp(&b.name));

    let text = match output {
        OutputFormat::Text => ConsoleFormatter::format_tools(&definitions),
        OutputFormat::Json => ConsoleFormatter::format_tools_json(&definitions),
    };
    println!("{}", text);
    Ok(())
}

async fn run_credentials(command: CredentialsCommand, config: &FileConfig) -> Result<()> {
    let vault = wiring::vault(config)?
        .context("credential vault is not configured; set vault.encryption_key")?;

    match command {
        CredentialsCommand::List { user } => {
            let connections = vault.connections(&user).await?;
            if connections.is_empty() {
                println!("No connected accounts for {}", user);
            }
            for credential in connections {
                let status = if credential.revoked {
                    "revoked (reconnect required)".to_string()
                } else {
                    format!("expires {}", credential.expires_at.to_rfc3339())
                };
                let account = credential
                    .profile
                    .email
                    .as_deref()
                    .or(credential.profile.display_name.as_deref())
                    .unwrap_or("-");
                println!(
                    "{:<12} {:<32} {}",
                    credential.key.provider, account, status
                );
            }
        }
        CredentialsCommand::Disconnect { provider, user } => {
            if vault.disconnect(&provider, &user).await? {
                println!("Disconnected {} for {}", provider, user);
            } else {
                println!("No {} connection stored for {}", provider, user);
            }
        }
    }
    Ok(())
}

fn run_config(
    command: ConfigCommand,
    config: &FileConfig,
    config_path: Option<&PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let text = toml::to_string_pretty(&config.redacted())
                .context("failed to render configuration")?;
            println!("{}", text);
        }
        ConfigCommand::Sources => ConfigLoader::print_config_sources(config_path),
        ConfigCommand::Validate => {
            let issues = config.validate();
            if issues.is_empty() {
                println!("Configuration OK");
            }
            for issue in &issues {
                println!("{}", issue);
            }
            if issues.iter().any(|i| i.is_error()) {
                bail!("configuration has errors");
            }
        }
    }
    Ok(())
}
