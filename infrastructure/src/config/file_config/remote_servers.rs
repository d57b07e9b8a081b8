//! Remote capability servers (`[[remote_servers]]` array)
//!
//! ```toml
//! [[remote_servers]]
//! name = "calendar"
//! base_url = "https://tools.example.com/calendar/sse"
//! auth_header_value = "k-123"
//! credential_provider = "google"
//! ```

use std::time::Duration;

use aion_domain::SecretString;
use serde::{Deserialize, Serialize};

use crate::protocol::client::DEFAULT_TIMEOUT;
use crate::protocol::error::Result;
use crate::protocol::{DEFAULT_AUTH_HEADER, RemoteServerSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRemoteServerConfig {
    pub name: String,
    /// With or without the trailing `/sse`
    pub base_url: String,
    pub auth_header_name: String,
    pub auth_header_value: Option<String>,
    pub timeout_secs: u64,
    /// Provider whose bearer token is attached for the calling user
    pub credential_provider: Option<String>,
    pub enabled: bool,
}

impl Default for FileRemoteServerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_url: String::new(),
            auth_header_name: DEFAULT_AUTH_HEADER.to_string(),
            auth_header_value: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            credential_provider: None,
            enabled: true,
        }
    }
}

impl FileRemoteServerConfig {
    pub fn to_settings(&self) -> Result<RemoteServerSettings> {
        let mut settings = RemoteServerSettings::new(&self.name, &self.base_url)?;
        if let Some(value) = &self.auth_header_value {
            settings = settings.with_auth_header(&self.auth_header_name, SecretString::new(value));
        }
        if let Some(provider) = &self.credential_provider {
            settings = settings.with_credential_provider(provider);
        }
        if self.timeout_secs > 0 {
            settings = settings.with_timeout(Duration::from_secs(self.timeout_secs));
        }
        Ok(settings)
    }
}
