//! Credential entities

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::secret::{SealedSecret, SecretString};

/// Identity of a credential: at most one per (provider, user) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CredentialKey {
    pub provider: String,
    pub user_id: String,
}

impl CredentialKey {
    pub fn new(provider: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.user_id)
    }
}

/// Provider-side account details captured at authorization time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Plaintext tokens as received from an authorization callback or refresh.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub scopes: Vec<String>,
}

impl TokenSet {
    /// Bearer token set expiring `expires_in_secs` from now.
    pub fn bearer(
        access_token: impl Into<SecretString>,
        refresh_token: Option<SecretString>,
        expires_in_secs: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

/// Persisted OAuth credential (Entity).
///
/// Both tokens are sealed. Mutated in place on refresh and on use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthCredential {
    pub key: CredentialKey,
    pub access_token: SealedSecret,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<SealedSecret>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub profile: ProviderProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Set when the provider rejected the refresh grant.
    #[serde(default)]
    pub revoked: bool,
}

impl OAuthCredential {
    pub fn new(
        key: CredentialKey,
        access_token: SealedSecret,
        refresh_token: Option<SealedSecret>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
        scopes: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            access_token,
            refresh_token,
            token_type: token_type.into(),
            expires_at,
            scopes,
            profile: ProviderProfile::default(),
            created_at: now,
            updated_at: now,
            last_used_at: None,
            revoked: false,
        }
    }

    pub fn with_profile(mut self, profile: ProviderProfile) -> Self {
        self.profile = profile;
        self
    }

    /// True when the access token expires within `margin` of `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at <= now + margin
    }

    pub fn can_refresh(&self) -> bool {
        !self.revoked && self.refresh_token.is_some()
    }

    /// Replace the access token (and optionally rotate the refresh token).
    pub fn apply_refresh(
        &mut self,
        access_token: SealedSecret,
        refresh_token: Option<SealedSecret>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.access_token = access_token;
        if let Some(rotated) = refresh_token {
            self.refresh_token = Some(rotated);
        }
        self.expires_at = expires_at;
        self.updated_at = now;
    }

    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.last_used_at = Some(now);
    }

    pub fn mark_revoked(&mut self, now: DateTime<Utc>) {
        self.revoked = true;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expires_at: DateTime<Utc>) -> OAuthCredential {
        OAuthCredential::new(
            CredentialKey::new("google", "u1"),
            SealedSecret::new("sealed-access"),
            Some(SealedSecret::new("sealed-refresh")),
            "Bearer",
            expires_at,
            vec!["gmail.readonly".into()],
            Utc::now(),
        )
    }

    #[test]
    fn test_needs_refresh_inside_margin() {
        let now = Utc::now();
        let margin = Duration::seconds(60);

        assert!(credential(now - Duration::seconds(10)).needs_refresh(now, margin));
        assert!(credential(now + Duration::seconds(30)).needs_refresh(now, margin));
        assert!(!credential(now + Duration::seconds(600)).needs_refresh(now, margin));
    }

    #[test]
    fn test_apply_refresh_keeps_refresh_token_when_not_rotated() {
        let now = Utc::now();
        let mut cred = credential(now);
        cred.apply_refresh(SealedSecret::new("new-access"), None, now + Duration::hours(1), now);

        assert_eq!(cred.access_token, SealedSecret::new("new-access"));
        assert_eq!(cred.refresh_token, Some(SealedSecret::new("sealed-refresh")));
        assert!(!cred.needs_refresh(now, Duration::seconds(60)));
    }

    #[test]
    fn test_revoked_cannot_refresh() {
        let mut cred = credential(Utc::now());
        assert!(cred.can_refresh());
        cred.mark_revoked(Utc::now());
        assert!(!cred.can_refresh());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(CredentialKey::new("google", "u1").to_string(), "google/u1");
    }

    #[test]
    fn test_token_set_debug_redacts() {
        let tokens = TokenSet::bearer("ya29.secret", Some("1//refresh".into()), 3600);
        let rendered = format!("{:?}", tokens);
        assert!(!rendered.contains("ya29"));
        assert!(!rendered.contains("1//refresh"));
    }
}
