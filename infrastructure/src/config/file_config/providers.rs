//! OAuth provider registrations (`[providers.<id>]` tables)
//!
//! ```toml
//! [providers.google]
//! token_url = "https://oauth2.googleapis.com/token"
//! client_id = "1234.apps.googleusercontent.com"
//! client_secret = "..."
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use aion_domain::SecretString;
use serde::{Deserialize, Serialize};

use crate::vault::{HttpTokenEndpoint, OAuthProvider, RefreshError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOAuthProviderConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl FileOAuthProviderConfig {
    pub fn to_provider(&self) -> OAuthProvider {
        OAuthProvider {
            token_url: self.token_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: SecretString::new(self.client_secret.clone()),
        }
    }
}

pub type FileProvidersConfig = BTreeMap<String, FileOAuthProviderConfig>;

/// Token endpoint knowing every configured provider.
pub fn build_token_endpoint(
    providers: &FileProvidersConfig,
    timeout: Duration,
) -> Result<HttpTokenEndpoint, RefreshError> {
    let mut endpoint = HttpTokenEndpoint::new(timeout)?;
    for (id, provider) in providers {
        endpoint = endpoint.with_provider(id.clone(), provider.to_provider());
    }
    Ok(endpoint)
}
