//! Raw TOML configuration data types
//!
//! These structs mirror the config file one-to-one. Every section is
//! `#[serde(default)]`, so a partial file (or none at all) is valid.

mod logging;
mod model;
mod orchestrator;
mod providers;
mod remote_servers;
mod tools;
mod vault;

pub use logging::FileLoggingConfig;
pub use model::{DEFAULT_API_KEY_ENV, FileModelConfig};
pub use orchestrator::FileOrchestratorConfig;
pub use providers::{FileOAuthProviderConfig, FileProvidersConfig, build_token_endpoint};
pub use remote_servers::FileRemoteServerConfig;
pub use tools::{FileCodeRunnerConfig, FileKnowledgeBaseConfig, FileToolsConfig, FileWebFetchConfig};
pub use vault::FileVaultConfig;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::issue::{ConfigIssue, ConfigIssueCode};

const REDACTED: &str = "[REDACTED]";

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub orchestrator: FileOrchestratorConfig,
    pub model: FileModelConfig,
    pub tools: FileToolsConfig,
    pub vault: FileVaultConfig,
    pub providers: FileProvidersConfig,
    pub remote_servers: Vec<FileRemoteServerConfig>,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        issues.extend(self.orchestrator.to_turn_params().1);
        issues.extend(self.vault.cipher().1);

        if self.vault.encryption_key.is_none()
            && self
                .remote_servers
                .iter()
                .any(|s| s.enabled && s.credential_provider.is_some())
        {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::MissingEncryptionKey,
                "remote servers use OAuth credentials but vault.encryption_key is not set; \
                 stored credentials cannot be read",
            ));
        }

        let mut seen = HashSet::new();
        for server in &self.remote_servers {
            if !seen.insert(server.name.as_str()) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::DuplicateRemoteServer {
                        name: server.name.clone(),
                    },
                    format!("remote_servers: '{}' is defined more than once", server.name),
                ));
            }

            if let Err(e) = server.to_settings() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidRemoteServerUrl {
                        name: server.name.clone(),
                    },
                    format!("remote_servers.{}: {}", server.name, e),
                ));
            }

            if let Some(provider) = &server.credential_provider
                && !self.providers.contains_key(provider)
            {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownProvider {
                        server: server.name.clone(),
                        provider: provider.clone(),
                    },
                    format!(
                        "remote_servers.{}: credential_provider '{}' has no [providers.{}] table",
                        server.name, provider, provider
                    ),
                ));
            }
        }

        issues
    }

    /// Copy safe to print: every secret value replaced.
    pub fn redacted(&self) -> FileConfig {
        let mut config = self.clone();
        let hide = |value: &mut Option<String>| {
            if value.is_some() {
                *value = Some(REDACTED.to_string());
            }
        };
        hide(&mut config.model.api_key);
        hide(&mut config.vault.encryption_key);
        for provider in config.providers.values_mut() {
            if !provider.client_secret.is_empty() {
                provider.client_secret = REDACTED.to_string();
            }
        }
        for server in &mut config.remote_servers {
            hide(&mut server.auth_header_value);
        }
        config
    }

    /// Remote servers that are switched on.
    pub fn enabled_remote_servers(&self) -> impl Iterator<Item = &FileRemoteServerConfig> {
        self.remote_servers.iter().filter(|s| s.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::VaultCipher;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[orchestrator]
max_iterations = 3
default_tool_choice = "none"

[model]
model = "anthropic/claude-3.5-sonnet"
temperature = 0.3

[tools]
enabled = ["calculator", "code_runner"]

[vault]
refresh_margin_secs = 120

[providers.google]
token_url = "https://oauth2.googleapis.com/token"
client_id = "cid"
client_secret = "secret"

[[remote_servers]]
name = "calendar"
base_url = "https://tools.example.com/calendar"
credential_provider = "google"

[[remote_servers]]
name = "weather"
base_url = "https://tools.example.com/weather/sse"
enabled = false

[logging]
conversation_log = "/tmp/aion.jsonl"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.orchestrator.max_iterations, 3);
        assert_eq!(config.orchestrator.turn_timeout_secs, 120);
        assert_eq!(config.model.model, "anthropic/claude-3.5-sonnet");
        assert_eq!(config.model.api_key_env, DEFAULT_API_KEY_ENV);
        assert_eq!(config.tools.enabled.len(), 2);
        assert_eq!(config.vault.refresh_margin_secs, 120);
        assert_eq!(config.remote_servers.len(), 2);
        assert_eq!(config.enabled_remote_servers().count(), 1);
        assert!(config.logging.conversation_log.is_some());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = FileConfig::default();
        assert!(config.remote_servers.is_empty());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let config: FileConfig = toml::from_str(
            r#"
[orchestrator]
max_iterations = 0
default_tool_choice = "forced:"

[vault]
encryption_key = "bm90LWEta2V5"

[[remote_servers]]
name = "calendar"
base_url = "https://a.example.com"
credential_provider = "google"

[[remote_servers]]
name = "calendar"
base_url = "https://b.example.com"
"#,
        )
        .unwrap();

        let codes: Vec<ConfigIssueCode> = config.validate().into_iter().map(|i| i.code).collect();
        assert!(codes.contains(&ConfigIssueCode::InvalidToolChoice {
            value: "forced:".to_string()
        }));
        assert!(codes.contains(&ConfigIssueCode::InvalidValue {
            field: "orchestrator.max_iterations".to_string(),
            value: "0".to_string()
        }));
        assert!(codes.contains(&ConfigIssueCode::InvalidEncryptionKey));
        assert!(codes.contains(&ConfigIssueCode::DuplicateRemoteServer {
            name: "calendar".to_string()
        }));
        assert!(codes.contains(&ConfigIssueCode::UnknownProvider {
            server: "calendar".to_string(),
            provider: "google".to_string()
        }));
    }

    #[test]
    fn test_missing_key_with_credential_provider_warns() {
        let mut config = FileConfig::default();
        config
            .providers
            .insert("google".to_string(), FileOAuthProviderConfig::default());
        config.remote_servers.push(FileRemoteServerConfig {
            name: "calendar".to_string(),
            base_url: "https://tools.example.com".to_string(),
            credential_provider: Some("google".to_string()),
            ..Default::default()
        });

        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ConfigIssueCode::MissingEncryptionKey);
        assert!(!issues[0].is_error());
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let mut config = FileConfig::default();
        config.model.api_key = Some("sk-live".to_string());
        config.vault.encryption_key = Some(VaultCipher::generate_key());
        config.providers.insert(
            "google".to_string(),
            FileOAuthProviderConfig {
                client_secret: "client-secret".to_string(),
                ..Default::default()
            },
        );
        config.remote_servers.push(FileRemoteServerConfig {
            auth_header_value: Some("k-123".to_string()),
            ..Default::default()
        });

        let printed = toml::to_string(&config.redacted()).unwrap();
        for secret in ["sk-live", "client-secret", "k-123"] {
            assert!(!printed.contains(secret), "{} leaked", secret);
        }
        assert!(!printed.contains(config.vault.encryption_key.as_deref().unwrap()));
        assert!(printed.contains(REDACTED));
    }
}
