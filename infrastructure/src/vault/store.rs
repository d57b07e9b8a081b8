//! Credential persistence.
//!
//! Stores only ever see [`OAuthCredential`]s, whose token fields are already
//! sealed. One credential per [`CredentialKey`]; `put` replaces.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use aion_domain::{CredentialKey, OAuthCredential};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &CredentialKey) -> Result<Option<OAuthCredential>, StoreError>;

    /// Insert or replace the credential for `credential.key`.
    async fn put(&self, credential: OAuthCredential) -> Result<(), StoreError>;

    /// Returns whether a credential was removed.
    async fn delete(&self, key: &CredentialKey) -> Result<bool, StoreError>;

    /// All credentials of one user, ordered by provider.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<OAuthCredential>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    rows: RwLock<BTreeMap<CredentialKey, OAuthCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, key: &CredentialKey) -> Result<Option<OAuthCredential>, StoreError> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn put(&self, credential: OAuthCredential) -> Result<(), StoreError> {
        self.rows
            .write()
            .await
            .insert(credential.key.clone(), credential);
        Ok(())
    }

    async fn delete(&self, key: &CredentialKey) -> Result<bool, StoreError> {
        Ok(self.rows.write().await.remove(key).is_some())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<OAuthCredential>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|c| c.key.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// JSON file holding every credential as an array.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash never leaves a half-written store behind.
#[derive(Debug)]
pub struct JsonFileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<CredentialKey, OAuthCredential>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let rows: Vec<OAuthCredential> = serde_json::from_str(&raw)?;
        Ok(rows.into_iter().map(|c| (c.key.clone(), c)).collect())
    }

    async fn save(&self, rows: &BTreeMap<CredentialKey, OAuthCredential>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let values: Vec<&OAuthCredential> = rows.values().collect();
        let json = serde_json::to_string_pretty(&values)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = rows.len(), "Credential store saved");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for JsonFileCredentialStore {
    async fn get(&self, key: &CredentialKey) -> Result<Option<OAuthCredential>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn put(&self, credential: OAuthCredential) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        rows.insert(credential.key.clone(), credential);
        self.save(&rows).await
    }

    async fn delete(&self, key: &CredentialKey) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        let removed = rows.remove(key).is_some();
        if removed {
            self.save(&rows).await?;
        }
        Ok(removed)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<OAuthCredential>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_values()
            .filter(|c| c.key.user_id == user_id)
            .collect())
    }
}
