use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("decryption failed: {0}")]
    Decryption(String),
}

/// Identifies the saved object an attribute belongs to. Bound into the
/// ciphertext as associated data, so a value cannot be replayed onto
/// another object.
#[derive(Clone, Copy, Debug)]
pub struct AttributeDescriptor<'a> {
    pub object_type: &'a str,
    pub id: &'a str,
}

impl AttributeDescriptor<'_> {
    fn associated_data(&self) -> Vec<u8> {
        format!("{}:{}", self.object_type, self.id).into_bytes()
    }
}

/// AES-256-GCM cipher for sensitive saved-object attributes.
pub struct EncryptedSavedObjects {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl EncryptedSavedObjects {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    pub fn shared(key: [u8; KEY_SIZE]) -> Arc<Self> {
        Arc::new(Self::new(key))
    }

    /// Random key for this process only; values do not survive a restart.
    pub fn ephemeral() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self::new(key)
    }

    /// Accepts a base64-encoded 32-byte key.
    pub fn from_encoded_key(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|err| CryptoError::InvalidKey(err.to_string()))?,
        );
        let key: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected {KEY_SIZE} bytes, got {}", bytes.len()))
        })?;
        Ok(Self::new(key))
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(&*self.key)
            .map_err(|err| CryptoError::InvalidKey(err.to_string()))
    }

    pub fn encrypt_attribute(
        &self,
        descriptor: AttributeDescriptor<'_>,
        plaintext: &str,
    ) -> Result<String, CryptoError> {
        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let aad = descriptor.associated_data();
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: &aad,
                },
            )
            .map_err(|err| CryptoError::Encryption(err.to_string()))?;
        let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(envelope))
    }

    pub fn decrypt_attribute(
        &self,
        descriptor: AttributeDescriptor<'_>,
        encoded: &str,
    ) -> Result<String, CryptoError> {
        let envelope = STANDARD
            .decode(encoded)
            .map_err(|err| CryptoError::Decryption(err.to_string()))?;
        if envelope.len() <= NONCE_SIZE {
            return Err(CryptoError::Decryption("envelope too short".to_string()));
        }
        let (nonce, ciphertext) = envelope.split_at(NONCE_SIZE);
        let aad = descriptor.associated_data();
        let plaintext = self
            .cipher()?
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|err| CryptoError::Decryption(err.to_string()))?;
        String::from_utf8(plaintext).map_err(|err| CryptoError::Decryption(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str) -> AttributeDescriptor<'_> {
        AttributeDescriptor {
            object_type: "alert",
            id,
        }
    }

    #[test]
    fn attribute_is_bound_to_its_object() {
        let eso = EncryptedSavedObjects::new([7u8; 32]);
        let sealed = eso.encrypt_attribute(rule("r1"), "secret").expect("encrypt");
        assert_ne!(sealed, "secret");
        assert_eq!(eso.decrypt_attribute(rule("r1"), &sealed).expect("decrypt"), "secret");
        assert!(eso.decrypt_attribute(rule("r2"), &sealed).is_err());
    }

    #[test]
    fn encoded_key_must_be_32_bytes() {
        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            EncryptedSavedObjects::from_encoded_key(&short),
            Err(CryptoError::InvalidKey(_))
        ));
        let valid = STANDARD.encode([1u8; 32]);
        assert!(EncryptedSavedObjects::from_encoded_key(&valid).is_ok());
    }
}
