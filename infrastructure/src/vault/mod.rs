//! Credential vault.
//!
//! - [`cipher`]: AES-256-GCM sealing of tokens at rest
//! - [`store`]: persistence of sealed credentials
//! - [`endpoint`]: OAuth refresh grant
//! - [`credential_vault`]: refresh-on-use with per-key locking

pub mod cipher;
pub mod credential_vault;
pub mod endpoint;
pub mod store;

pub use cipher::{CipherError, VaultCipher};
pub use credential_vault::{CredentialVault, DEFAULT_REFRESH_MARGIN_SECS, VaultError};
pub use endpoint::{HttpTokenEndpoint, OAuthProvider, RefreshError, RefreshedTokens, TokenEndpoint};
pub use store::{CredentialStore, InMemoryCredentialStore, JsonFileCredentialStore, StoreError};
