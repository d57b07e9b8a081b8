//! Token encryption at rest.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per seal. The sealed form is
//! `base64(nonce || ciphertext || tag)`, so a credential row is
//! self-contained and two seals of the same token never compare equal.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use aion_domain::{SealedSecret, SecretString};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Encryption key must be base64 of exactly 32 bytes")]
    InvalidKey,

    #[error("Sealed value is not valid base64 or too short")]
    MalformedSealed,

    #[error("Failed to encrypt secret")]
    Encryption,

    /// Wrong key or tampered ciphertext.
    #[error("Failed to decrypt secret")]
    Decryption,
}

pub struct VaultCipher {
    cipher: Aes256Gcm,
}

impl VaultCipher {
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_SIZE {
            return Err(CipherError::InvalidKey);
        }
        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        })
    }

    /// Key as configured: base64 of 32 random bytes.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CipherError> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|_| CipherError::InvalidKey)?,
        );
        Self::from_key_bytes(&bytes)
    }

    /// New random key, base64-encoded, for `vault.encryption_key`.
    pub fn generate_key() -> String {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        rand::thread_rng().fill_bytes(&mut key[..]);
        STANDARD.encode(&key[..])
    }

    pub fn seal(&self, secret: &SecretString) -> Result<SealedSecret, CipherError> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), secret.expose().as_bytes())
            .map_err(|_| CipherError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(SealedSecret::new(STANDARD.encode(out)))
    }

    pub fn open(&self, sealed: &SealedSecret) -> Result<SecretString, CipherError> {
        let raw = STANDARD
            .decode(sealed.as_str())
            .map_err(|_| CipherError::MalformedSealed)?;
        if raw.len() <= NONCE_SIZE {
            return Err(CipherError::MalformedSealed);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);

        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| CipherError::Decryption)?,
        );
        let text = std::str::from_utf8(&plaintext).map_err(|_| CipherError::Decryption)?;
        Ok(SecretString::new(text))
    }
}

impl std::fmt::Debug for VaultCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultCipher(AES-256-GCM)")
    }
}
