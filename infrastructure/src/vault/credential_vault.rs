//! Credential vault: sealed OAuth tokens with expiry-aware refresh.
//!
//! ```text
//! get_valid_token(provider, user)
//!   │  per-key lock
//!   ▼
//! load ──none/revoked──▶ AuthRequired
//!   │
//!   ├─ expires within margin ──▶ refresh ──rejected──▶ mark revoked ──▶ AuthRequired
//!   │                              │
//!   │                              └─ ok: replace access token + expiry
//!   ▼
//! open access token, bump last_used, return
//! ```
//!
//! Refresh and use of one (provider, user) key never overlap; different keys
//! proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use aion_domain::{
    CredentialKey, OAuthCredential, ProviderProfile, SecretString, TokenSet,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::cipher::{CipherError, VaultCipher};
use super::endpoint::{RefreshError, TokenEndpoint};
use super::store::{CredentialStore, StoreError};
use crate::protocol::{BearerTokenSource, ProtocolError};

/// Default safety margin before expiry at which a token is refreshed.
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Error, Debug)]
pub enum VaultError {
    /// Access token is inside the safety margin. Recovered by refreshing.
    #[error("Credential {key} expired at {expires_at}")]
    Expired {
        key: CredentialKey,
        expires_at: DateTime<Utc>,
    },

    /// No usable credential; the user has to (re)authorize the provider.
    #[error("Authorization required for provider '{provider}' (user '{user}')")]
    AuthRequired { provider: String, user: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl VaultError {
    fn auth_required(key: &CredentialKey) -> Self {
        VaultError::AuthRequired {
            provider: key.provider.clone(),
            user: key.user_id.clone(),
        }
    }
}

pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
    cipher: VaultCipher,
    endpoint: Arc<dyn TokenEndpoint>,
    margin: Duration,
    locks: Mutex<HashMap<CredentialKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl CredentialVault {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cipher: VaultCipher,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            store,
            cipher,
            endpoint,
            margin: Duration::seconds(DEFAULT_REFRESH_MARGIN_SECS),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    fn lock_for(&self, key: &CredentialKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }

    /// A decrypted access token valid for at least the safety margin.
    pub async fn get_valid_token(
        &self,
        provider: &str,
        user_id: &str,
    ) -> Result<SecretString, VaultError> {
        let key = CredentialKey::new(provider, user_id);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let Some(mut credential) = self.store.get(&key).await? else {
            debug!(credential = %key, "No stored credential");
            return Err(VaultError::auth_required(&key));
        };
        if credential.revoked {
            return Err(VaultError::auth_required(&key));
        }

        let now = Utc::now();
        if let Err(expired) = self.check_fresh(&credential, now) {
            info!(error = %expired, "Refreshing credential");
            self.refresh(&mut credential, now).await?;
        }

        let token = self.cipher.open(&credential.access_token)?;
        credential.mark_used(now);
        self.store.put(credential).await?;
        Ok(token)
    }

    fn check_fresh(&self, credential: &OAuthCredential, now: DateTime<Utc>) -> Result<(), VaultError> {
        if credential.needs_refresh(now, self.margin) {
            return Err(VaultError::Expired {
                key: credential.key.clone(),
                expires_at: credential.expires_at,
            });
        }
        Ok(())
    }

    async fn refresh(
        &self,
        credential: &mut OAuthCredential,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        let key = credential.key.clone();
        let sealed_refresh = match &credential.refresh_token {
            Some(sealed) if credential.can_refresh() => sealed.clone(),
            _ => {
                warn!(credential = %key, "Credential expired and cannot be refreshed");
                return Err(VaultError::auth_required(&key));
            }
        };
        let refresh_token = self.cipher.open(&sealed_refresh)?;

        match self.endpoint.refresh(&key.provider, &refresh_token).await {
            Ok(tokens) => {
                let access = self.cipher.seal(&tokens.access_token)?;
                let rotated = tokens
                    .refresh_token
                    .as_ref()
                    .map(|t| self.cipher.seal(t))
                    .transpose()?;
                let expires_at = now + Duration::seconds(tokens.expires_in_secs);
                credential.apply_refresh(access, rotated, expires_at, now);
                if let Some(scopes) = tokens.scopes {
                    credential.scopes = scopes;
                }
                self.store.put(credential.clone()).await?;
                info!(credential = %key, %expires_at, "Credential refreshed");

                // A provider handing out tokens shorter than the margin would
                // make every call refresh again; refuse rather than return one.
                self.check_fresh(credential, now).map_err(|_| {
                    VaultError::RefreshFailed(
                        "provider issued a token expiring within the safety margin".to_string(),
                    )
                })
            }
            Err(RefreshError::Rejected(reason)) => {
                warn!(credential = %key, %reason, "Refresh rejected, credential revoked");
                credential.mark_revoked(now);
                self.store.put(credential.clone()).await?;
                Err(VaultError::auth_required(&key))
            }
            Err(e) => Err(VaultError::RefreshFailed(e.to_string())),
        }
    }

    /// Persist tokens from a completed authorization. Replaces any existing
    /// credential for the pair.
    pub async fn store(
        &self,
        provider: &str,
        user_id: &str,
        tokens: TokenSet,
        profile: ProviderProfile,
    ) -> Result<(), VaultError> {
        let key = CredentialKey::new(provider, user_id);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let access = self.cipher.seal(&tokens.access_token)?;
        let refresh = tokens
            .refresh_token
            .as_ref()
            .map(|t| self.cipher.seal(t))
            .transpose()?;

        let credential = OAuthCredential::new(
            key.clone(),
            access,
            refresh,
            tokens.token_type,
            tokens.expires_at,
            tokens.scopes,
            Utc::now(),
        )
        .with_profile(profile);
        self.store.put(credential).await?;
        info!(credential = %key, "Credential stored");
        Ok(())
    }

    /// Delete the credential. Returns whether one existed.
    ///
    /// The key's lock stays registered: callers already queued on it must
    /// keep excluding whoever comes after the disconnect.
    pub async fn disconnect(&self, provider: &str, user_id: &str) -> Result<bool, VaultError> {
        let key = CredentialKey::new(provider, user_id);
        let lock = self.lock_for(&key);
        let removed = {
            let _guard = lock.lock().await;
            self.store.delete(&key).await?
        };
        info!(credential = %key, removed, "Credential disconnected");
        Ok(removed)
    }

    /// Stored credentials of a user (tokens stay sealed).
    pub async fn connections(&self, user_id: &str) -> Result<Vec<OAuthCredential>, VaultError> {
        Ok(self.store.list_for_user(user_id).await?)
    }
}

#[async_trait]
impl BearerTokenSource for CredentialVault {
    async fn bearer_token(
        &self,
        provider: &str,
        user_id: &str,
    ) -> Result<SecretString, ProtocolError> {
        self.get_valid_token(provider, user_id)
            .await
            .map_err(|e| match e {
                VaultError::AuthRequired { provider, user } => {
                    ProtocolError::AuthRequired { provider, user }
                }
                other => ProtocolError::Credential(other.to_string()),
            })
    }
}
