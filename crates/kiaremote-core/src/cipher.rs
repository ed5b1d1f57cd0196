//! Authenticated encryption for data at rest.
//!
//! Blobs are `base64(nonce || ciphertext)` under ChaCha20-Poly1305. A fresh
//! random nonce is drawn for every encryption, so encrypting the same
//! plaintext twice never yields the same blob.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{Error, Result};

/// Nonce length for ChaCha20-Poly1305 (96 bits)
pub const NONCE_LEN: usize = 12;

/// Key length in bytes (256 bits)
pub const KEY_LEN: usize = 32;

/// Fixed salt for stretching the configured secret into a cipher key.
/// Changing it invalidates every existing store.
const KEY_SALT: &[u8] = b"kiaremote.session-store.v1";

/// Argon2id parameters for key stretching (the crate defaults: 19 MiB, 2 passes)
const ARGON2_M_COST: u32 = 19 * 1024;
const ARGON2_T_COST: u32 = 2;
const ARGON2_P_COST: u32 = 1;

#[derive(Clone)]
pub struct Cipher {
    aead: ChaCha20Poly1305,
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cipher { .. }")
    }
}

impl Cipher {
    /// Build a cipher from 32 raw key bytes
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            aead: ChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }

    /// Derive the key from an operator-supplied secret using Argon2id.
    ///
    /// Derivation is deterministic: the same secret always opens the same store.
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("encryption key must not be empty".to_string()));
        }

        let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(KEY_LEN))
            .map_err(|e| Error::Config(format!("invalid Argon2 parameters: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(secret.as_bytes(), KEY_SALT, &mut key)
            .map_err(|e| Error::Config(format!("key derivation failed: {}", e)))?;

        Ok(Self::new(key))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| Error::Crypto("encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    pub fn decrypt(&self, blob: &str) -> Result<Vec<u8>> {
        let raw = STANDARD
            .decode(blob.trim())
            .map_err(|e| Error::Crypto(format!("blob is not valid base64: {}", e)))?;

        if raw.len() < NONCE_LEN {
            return Err(Error::Crypto(format!(
                "blob is {} bytes, shorter than the {}-byte nonce",
                raw.len(),
                NONCE_LEN
            )));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        self.aead
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Crypto("wrong key or corrupted data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> Cipher {
        Cipher::new([7u8; KEY_LEN])
    }

    #[test]
    fn test_round_trip() {
        let c = cipher();
        for plaintext in [&b""[..], b"a", b"vehicle key and cookies", &[0u8, 255, 13, 10]] {
            let blob = c.encrypt(plaintext).unwrap();
            assert_eq!(c.decrypt(&blob).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let c = cipher();
        let a = c.encrypt(b"same").unwrap();
        let b = c.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = cipher().encrypt(b"secret").unwrap();
        let other = Cipher::new([8u8; KEY_LEN]);
        assert!(matches!(other.decrypt(&blob), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let c = cipher();
        let blob = c.encrypt(b"secret").unwrap();
        let mut raw = STANDARD.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(matches!(c.decrypt(&STANDARD.encode(&raw)), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let c = cipher();
        let mut raw = STANDARD.decode(c.encrypt(b"secret").unwrap()).unwrap();
        raw[0] ^= 0x80;
        assert!(matches!(c.decrypt(&STANDARD.encode(&raw)), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_short_blob_rejected() {
        let short = STANDARD.encode([1u8; NONCE_LEN - 1]);
        assert!(matches!(cipher().decrypt(&short), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(matches!(cipher().decrypt("not base64!!"), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_from_secret_is_deterministic() {
        let a = Cipher::from_secret("correct horse").unwrap();
        let b = Cipher::from_secret("correct horse").unwrap();
        let blob = a.encrypt(b"payload").unwrap();
        assert_eq!(b.decrypt(&blob).unwrap(), b"payload");

        let c = Cipher::from_secret("battery staple").unwrap();
        assert!(c.decrypt(&blob).is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(Cipher::from_secret(""), Err(Error::Config(_))));
    }
}
