//! Sealing of configuration blobs and random identifiers

use crate::error::{ControlPlaneError, Result};
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const NONCE_LEN: usize = 12;

/// AES-256-GCM with a fresh random nonce per message.
///
/// Sealed text is `base64(nonce || ciphertext || tag)`.
#[derive(Clone)]
pub struct ConfCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for ConfCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ConfCipher(<redacted>)")
    }
}

impl ConfCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Key from base64 of exactly 32 bytes
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ControlPlaneError::Crypto(format!("base64 decode: {e}")))?;
        let key: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            ControlPlaneError::Crypto(format!("key must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Self::new(key))
    }

    /// Fresh random key, base64-encoded
    pub fn generate_key() -> String {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        STANDARD.encode(key)
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| ControlPlaneError::Crypto(format!("AES-GCM encrypt: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    pub fn open(&self, sealed: &str) -> Result<Vec<u8>> {
        let combined = STANDARD
            .decode(sealed)
            .map_err(|e| ControlPlaneError::Crypto(format!("base64 decode: {e}")))?;

        if combined.len() <= NONCE_LEN {
            return Err(ControlPlaneError::Crypto("ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| ControlPlaneError::Crypto(format!("AES-GCM decrypt: {e}")))
    }
}

/// Lowercase hex of `bytes` random bytes
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = ConfCipher::new([7u8; 32]);
        let sealed = cipher.seal(b"{\"vpc_id\":\"vpc-1\"}").unwrap();
        assert_ne!(sealed, "{\"vpc_id\":\"vpc-1\"}");
        assert_eq!(cipher.open(&sealed).unwrap(), b"{\"vpc_id\":\"vpc-1\"}");
    }

    #[test]
    fn test_nonce_differs_per_message() {
        let cipher = ConfCipher::new([7u8; 32]);
        assert_ne!(cipher.seal(b"same").unwrap(), cipher.seal(b"same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = ConfCipher::new([1u8; 32]).seal(b"secret").unwrap();
        assert!(ConfCipher::new([2u8; 32]).open(&sealed).is_err());
        assert!(ConfCipher::new([1u8; 32]).open("c2hvcnQ=").is_err());
    }

    #[test]
    fn test_key_parsing() {
        let key = ConfCipher::generate_key();
        assert!(ConfCipher::from_base64(&key).is_ok());
        assert!(ConfCipher::from_base64("c2hvcnQ=").is_err());
    }

    #[test]
    fn test_random_hex() {
        let slug = random_hex(10);
        assert_eq!(slug.len(), 20);
        assert!(slug.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(random_hex(10), slug);
    }
}
