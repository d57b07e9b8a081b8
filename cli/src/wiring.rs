//! Builds the adapters from configuration.

use std::sync::Arc;
use std::time::Duration;

use aion_application::{ConversationLogger, NoConversationLogger};
use aion_infrastructure::config::build_token_endpoint;
use aion_infrastructure::knowledge::InMemoryKnowledgeIndex;
use aion_infrastructure::protocol::{SessionTransport, discover};
use aion_infrastructure::vault::{CredentialStore, CredentialVault, JsonFileCredentialStore};
use aion_infrastructure::{
    Calculator, FileConfig, JsonlConversationLogger, KnowledgeBaseTool, OpenAiCompatibleGateway,
    ReqwestTransport, SessionRegistry, ToolRegistry,
};
use anyhow::{Context, Result, bail};
use tracing::{info, warn};

/// TCP/TLS setup; request and stream timeouts come from each server's settings.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const TOKEN_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(15);

/// The credential vault, when an encryption key is configured.
pub fn vault(config: &FileConfig) -> Result<Option<Arc<CredentialVault>>> {
    let (cipher, issues) = config.vault.cipher();
    if let Some(issue) = issues.first() {
        bail!("{}", issue.message);
    }
    let Some(cipher) = cipher else {
        return Ok(None);
    };

    let path = config
        .vault
        .resolved_store_path()
        .context("no data directory for the credential store; set vault.store_path")?;
    let store: Arc<dyn CredentialStore> = Arc::new(JsonFileCredentialStore::new(path));
    let endpoint = build_token_endpoint(&config.providers, TOKEN_ENDPOINT_TIMEOUT)?;

    let vault = CredentialVault::new(store, cipher, Arc::new(endpoint)).with_refresh_margin(
        chrono::Duration::seconds(config.vault.refresh_margin_secs.max(0)),
    );
    Ok(Some(Arc::new(vault)))
}

pub fn sessions(
    config: &FileConfig,
    vault: Option<&Arc<CredentialVault>>,
) -> Result<Arc<SessionRegistry>> {
    let transport: Arc<dyn SessionTransport> = Arc::new(ReqwestTransport::new(CONNECT_TIMEOUT)?);

    let mut sessions = SessionRegistry::new();
    if let Some(vault) = vault {
        sessions = sessions.with_credentials(vault.clone());
    }
    for server in config.enabled_remote_servers() {
        let settings = server
            .to_settings()
            .with_context(|| format!("remote server '{}'", server.name))?;
        sessions.add_server(settings, transport.clone())?;
    }
    Ok(Arc::new(sessions))
}

/// Local tools plus whatever the remote servers expose to `user_id`.
///
/// A server that cannot be reached is skipped with a warning; its tools are
/// simply not offered for this run.
pub async fn tools(
    config: &FileConfig,
    sessions: &Arc<SessionRegistry>,
    user_id: Option<&str>,
) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Calculator::new())?;
    registry.register(config.tools.code_runner.build())?;
    registry.register(
        config
            .tools
            .web_fetch
            .build()
            .context("failed to build the web_fetch HTTP client")?,
    )?;

    let knowledge = &config.tools.knowledge_base;
    let index = match &knowledge.documents_path {
        Some(path) => InMemoryKnowledgeIndex::from_json_file(path)
            .with_context(|| format!("knowledge base {}", path.display()))?,
        None => InMemoryKnowledgeIndex::default(),
    };
    registry.register(
        KnowledgeBaseTool::new(Arc::new(index)).with_default_limit(knowledge.default_limit),
    )?;

    let servers: Vec<String> = sessions.servers().into_iter().map(String::from).collect();
    for server in &servers {
        match discover(sessions, server, user_id).await {
            Ok(remote) => {
                for tool in remote {
                    if let Err(e) = registry.register(tool) {
                        warn!(server = %server, "Skipping remote tool: {}", e);
                    }
                }
            }
            Err(e) => warn!(server = %server, "Remote tool discovery failed: {}", e),
        }
    }

    config.tools.apply_timeouts(&mut registry);
    info!(tools = registry.len(), "Tool registry ready");
    Ok(registry)
}

pub fn gateway(config: &FileConfig) -> Result<OpenAiCompatibleGateway> {
    let api_key = config.model.resolve_api_key().with_context(|| {
        format!(
            "no model API key: set {} or model.api_key",
            config.model.api_key_env
        )
    })?;
    Ok(OpenAiCompatibleGateway::new(
        config.model.to_gateway_settings(api_key),
    )?)
}

pub fn conversation_logger(config: &FileConfig) -> Arc<dyn ConversationLogger> {
    let Some(path) = &config.logging.conversation_log else {
        return Arc::new(NoConversationLogger);
    };
    match JsonlConversationLogger::open(path) {
        Ok(logger) => Arc::new(logger),
        Err(e) => {
            warn!(path = %path.display(), "Conversation log disabled: {}", e);
            Arc::new(NoConversationLogger)
        }
    }
}
