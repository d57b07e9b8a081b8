//! Configuration file loading for aion
//!
//! The priority order (highest to lowest):
//!
//! 1. `AION_*` environment variables, `__` between section and key
//! 2. `--config <path>` specified file
//! 3. Project root: `./aion.toml` or `./.aion.toml`
//! 4. Global: `$XDG_CONFIG_HOME/aion/config.toml`
//! 5. Default values

mod file_config;
mod issue;
mod loader;

pub use file_config::{
    DEFAULT_API_KEY_ENV, FileCodeRunnerConfig, FileConfig, FileKnowledgeBaseConfig,
    FileLoggingConfig, FileModelConfig, FileOAuthProviderConfig, FileOrchestratorConfig,
    FileProvidersConfig, FileRemoteServerConfig, FileToolsConfig, FileVaultConfig,
    FileWebFetchConfig,
    build_token_endpoint,
};
pub use issue::{ConfigIssue, ConfigIssueCode, Severity};
pub use loader::{ConfigLoader, ENV_PREFIX};
