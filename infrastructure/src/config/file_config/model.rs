//! `[model]` section: the chat-completions endpoint.

use std::time::Duration;

use aion_domain::SecretString;
use serde::{Deserialize, Serialize};

use crate::gateway::GatewaySettings;
use crate::gateway::openai_compatible::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT};

pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelConfig {
    pub base_url: String,
    /// Environment variable read when `api_key` is not set
    pub api_key_env: String,
    /// Inline key; prefer `api_key_env`
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for FileModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl FileModelConfig {
    /// Inline key first, then the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&self.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
            .map(SecretString::new)
    }

    pub fn to_gateway_settings(&self, api_key: SecretString) -> GatewaySettings {
        let mut settings = GatewaySettings::new(api_key)
            .with_base_url(&self.base_url)
            .with_model(&self.model);
        settings.temperature = self.temperature;
        settings.max_tokens = self.max_tokens;
        if self.timeout_secs > 0 {
            settings.timeout = Duration::from_secs(self.timeout_secs);
        }
        settings
    }
}
