//! OAuth credentials held by the vault.
//!
//! Plaintext secrets only ever live in a [`SecretString`] (redacted `Debug`,
//! zeroed on drop). What gets persisted is an [`OAuthCredential`] whose token
//! fields are [`SealedSecret`]s, i.e. ciphertext produced by the vault cipher.

pub mod entities;
pub mod secret;

pub use entities::{CredentialKey, OAuthCredential, ProviderProfile, TokenSet};
pub use secret::{SealedSecret, SecretString};
