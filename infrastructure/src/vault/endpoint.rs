//! OAuth token endpoint (refresh grant).

use std::collections::HashMap;
use std::time::Duration;

use aion_domain::SecretString;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The provider refused the refresh token; the user must reconnect.
    #[error("Refresh token rejected: {0}")]
    Rejected(String),

    #[error("Token endpoint unavailable: {0}")]
    Transient(String),

    #[error("No token endpoint configured for provider '{0}'")]
    UnknownProvider(String),
}

/// Result of a successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: SecretString,
    /// Present when the provider rotates refresh tokens.
    pub refresh_token: Option<SecretString>,
    pub expires_in_secs: i64,
    pub scopes: Option<Vec<String>>,
}

#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn refresh(
        &self,
        provider: &str,
        refresh_token: &SecretString,
    ) -> Result<RefreshedTokens, RefreshError>;
}

/// Client registration for one provider.
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

/// `grant_type=refresh_token` over HTTP, one registration per provider.
pub struct HttpTokenEndpoint {
    client: reqwest::Client,
    providers: HashMap<String, OAuthProvider>,
}

impl HttpTokenEndpoint {
    pub fn new(timeout: Duration) -> Result<Self, RefreshError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RefreshError::Transient(e.to_string()))?;
        Ok(Self {
            client,
            providers: HashMap::new(),
        })
    }

    pub fn with_provider(mut self, id: impl Into<String>, provider: OAuthProvider) -> Self {
        self.providers.insert(id.into(), provider);
        self
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn refresh(
        &self,
        provider: &str,
        refresh_token: &SecretString,
    ) -> Result<RefreshedTokens, RefreshError> {
        let registration = self
            .providers
            .get(provider)
            .ok_or_else(|| RefreshError::UnknownProvider(provider.to_string()))?;

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token.expose())
            .append_pair("client_id", &registration.client_id)
            .append_pair("client_secret", registration.client_secret.expose())
            .finish();
        let body = SecretString::new(body);

        debug!(provider, "Refreshing access token");
        let response = self
            .client
            .post(&registration.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(body.expose().to_string())
            .send()
            .await
            .map_err(|e| RefreshError::Transient(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RefreshError::Transient(e.to_string()))?;
        parse_token_response(status, &text)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Classify a token endpoint reply.
///
/// `invalid_grant` (any status) and HTTP 400/401 mean the grant is gone;
/// everything else is treated as transient.
pub(crate) fn parse_token_response(status: u16, body: &str) -> Result<RefreshedTokens, RefreshError> {
    let oauth_error = serde_json::from_str::<TokenErrorResponse>(body).ok();

    if let Some(err) = &oauth_error
        && err.error == "invalid_grant"
    {
        return Err(RefreshError::Rejected(describe(err)));
    }

    if !(200..300).contains(&status) {
        let reason = oauth_error
            .as_ref()
            .map(describe)
            .unwrap_or_else(|| format!("HTTP {}", status));
        return Err(match status {
            400 | 401 => RefreshError::Rejected(reason),
            _ => RefreshError::Transient(reason),
        });
    }

    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| RefreshError::Transient(format!("unreadable token response: {}", e)))?;
    if parsed.access_token.is_empty() {
        return Err(RefreshError::Transient(
            "token response without access_token".to_string(),
        ));
    }

    Ok(RefreshedTokens {
        access_token: SecretString::new(parsed.access_token),
        refresh_token: parsed
            .refresh_token
            .filter(|t| !t.is_empty())
            .map(SecretString::new),
        expires_in_secs: parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        scopes: parsed
            .scope
            .map(|s| s.split_whitespace().map(String::from).collect()),
    })
}

fn describe(err: &TokenErrorResponse) -> String {
    match &err.error_description {
        Some(description) => format!("{}: {}", err.error, description),
        None => err.error.clone(),
    }
}
