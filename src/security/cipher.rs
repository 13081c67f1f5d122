//! Reversible encryption of sensitive record fields.
//!
//! # Envelope
//! `enc:v1:` followed by base64(nonce || ciphertext || tag), AES-256-GCM with
//! a fresh 96-bit nonce per value and one static key from configuration.
//!
//! # Failure Policy
//! - Encryption failure is fatal unless `allow_plaintext_fallback` is set,
//!   in which case the plaintext is stored and a warning is logged
//! - Decryption never fails: wrong key, corrupt data, or values that were
//!   never encrypted come back as [`DECRYPTION_PLACEHOLDER`]

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::observability::metrics;
use crate::security::error::{SecurityError, SecurityResult};

const ENVELOPE_PREFIX: &str = "enc:v1:";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Returned in place of a value that could not be decrypted.
pub const DECRYPTION_PLACEHOLDER: &str = "[decryption failed]";

/// Symmetric cipher for sensitive fields.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
    allow_plaintext_fallback: bool,
}

impl FieldCipher {
    pub fn new(key: &[u8], allow_plaintext_fallback: bool) -> SecurityResult<Self> {
        if key.len() != KEY_LEN {
            return Err(SecurityError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| SecurityError::InvalidKey("rejected by cipher".to_string()))?;
        if allow_plaintext_fallback {
            tracing::warn!("Plaintext fallback enabled for sensitive fields");
        }
        Ok(Self {
            cipher,
            allow_plaintext_fallback,
        })
    }

    /// Build from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str, allow_plaintext_fallback: bool) -> SecurityResult<Self> {
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|e| SecurityError::InvalidKey(e.to_string()))?;
        Self::new(&key, allow_plaintext_fallback)
    }

    /// Generate a random key, base64-encoded.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }

    pub fn encrypt(&self, plaintext: Option<&str>) -> SecurityResult<Option<String>> {
        let Some(plaintext) = plaintext else {
            return Ok(None);
        };
        match self.seal(plaintext) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(_) if self.allow_plaintext_fallback => {
                tracing::warn!(target: "audit", event = "encryption_fallback", "Storing sensitive field unencrypted");
                Ok(Some(plaintext.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    pub fn decrypt(&self, envelope: Option<&str>) -> Option<String> {
        let envelope = envelope?;
        match self.open(envelope) {
            Some(plaintext) => Some(plaintext),
            None => {
                tracing::warn!(target: "audit", event = "decryption_fallback", "Sensitive field could not be decrypted");
                metrics::record_decryption_fallback();
                Some(DECRYPTION_PLACEHOLDER.to_string())
            }
        }
    }

    fn seal(&self, plaintext: &str) -> SecurityResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| SecurityError::EncryptionFailure)?;

        let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(&nonce_bytes);
        raw.extend_from_slice(&ciphertext);
        Ok(format!("{ENVELOPE_PREFIX}{}", BASE64.encode(raw)))
    }

    fn open(&self, envelope: &str) -> Option<String> {
        let encoded = envelope.strip_prefix(ENVELOPE_PREFIX)?;
        let raw = BASE64.decode(encoded).ok()?;
        if raw.len() < NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self.cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()?;
        String::from_utf8(plaintext).ok()
    }
}
