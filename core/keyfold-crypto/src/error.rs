//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed (wrong key or tampered data): {0}")]
    Decryption(String),

    /// Unwrapping a wrapped data key failed. Kept distinct from
    /// [`CryptoError::Decryption`] so callers can tell a bad accessor key
    /// from a tampered payload.
    #[error("key unwrap failed: {0}")]
    Unwrap(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}
