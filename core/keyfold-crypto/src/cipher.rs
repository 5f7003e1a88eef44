//! AES-256-GCM authenticated encryption.
//!
//! Every seal binds associated data (the owning container's id) into the
//! GCM tag, so a ciphertext moved between containers fails to open.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// GCM nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// An AEAD-sealed payload: fresh random nonce plus ciphertext || tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    #[serde(with = "crate::b64")]
    pub ciphertext: Vec<u8>,
}

/// Seals a plaintext under the key, binding `aad` into the tag.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8], aad: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(format!("cipher init failed: {e}")))?;

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::Encryption(format!("seal failed: {e}")))?;

    Ok(EncryptedData { nonce, ciphertext })
}

/// Opens a sealed payload. Fails if the key, nonce, ciphertext or `aad`
/// differ from what was sealed.
pub fn decrypt(key: &DerivedKey, data: &EncryptedData, aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Decryption(format!("cipher init failed: {e}")))?;

    cipher
        .decrypt(
            Nonce::from_slice(&data.nonce),
            Payload {
                msg: data.ciphertext.as_ref(),
                aad,
            },
        )
        .map_err(|_| CryptoError::Decryption("authentication tag mismatch".to_string()))
}
