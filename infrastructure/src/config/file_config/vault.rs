//! `[vault]` section: credential encryption and storage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use crate::vault::{DEFAULT_REFRESH_MARGIN_SECS, VaultCipher};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileVaultConfig {
    /// Base64 of 32 random bytes; usually set via `AION_VAULT__ENCRYPTION_KEY`
    pub encryption_key: Option<String>,
    /// Defaults to `<data dir>/aion/credentials.json`
    pub store_path: Option<PathBuf>,
    pub refresh_margin_secs: i64,
}

impl Default for FileVaultConfig {
    fn default() -> Self {
        Self {
            encryption_key: None,
            store_path: None,
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
        }
    }
}

impl FileVaultConfig {
    pub fn resolved_store_path(&self) -> Option<PathBuf> {
        self.store_path
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("aion").join("credentials.json")))
    }

    /// The cipher, when a usable key is configured.
    pub fn cipher(&self) -> (Option<VaultCipher>, Vec<ConfigIssue>) {
        let Some(key) = self.encryption_key.as_deref() else {
            return (None, Vec::new());
        };
        match VaultCipher::from_base64_key(key) {
            Ok(cipher) => (Some(cipher), Vec::new()),
            Err(e) => (
                None,
                vec![ConfigIssue::error(
                    ConfigIssueCode::InvalidEncryptionKey,
                    format!("vault.encryption_key: {}", e),
                )],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_key_builds_cipher() {
        let config = FileVaultConfig {
            encryption_key: Some(VaultCipher::generate_key()),
            ..Default::default()
        };
        let (cipher, issues) = config.cipher();
        assert!(cipher.is_some());
        assert!(issues.is_empty());
    }

    #[test]
    fn test_malformed_key_is_reported() {
        let config = FileVaultConfig {
            encryption_key: Some("too-short".to_string()),
            ..Default::default()
        };
        let (cipher, issues) = config.cipher();
        assert!(cipher.is_none());
        assert_eq!(issues[0].code, ConfigIssueCode::InvalidEncryptionKey);
        assert!(!issues[0].message.contains("too-short"));
    }

    #[test]
    fn test_no_key_is_not_an_issue() {
        let (cipher, issues) = FileVaultConfig::default().cipher();
        assert!(cipher.is_none());
        assert!(issues.is_empty());
    }
}
