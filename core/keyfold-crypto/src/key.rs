//! Key derivation and symmetric key material.
//!
//! Master keys are derived from passwords with PBKDF2-HMAC-SHA256; data keys
//! are drawn from the OS RNG. The KDF parameters travel with whatever they
//! protect (auth records, private-key envelopes) so a client can re-derive
//! the same key from the password alone.

use crate::error::{CryptoError, CryptoResult};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key length in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// KDF salt length in bytes.
pub const SALT_SIZE: usize = 16;

/// Default PBKDF2 iteration count.
const DEFAULT_ITERATIONS: u32 = 100_000;

/// Fills a buffer of the given size from the OS RNG.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

/// A random per-derivation salt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Password hashing algorithm identifier. Travels with [`KdfParams`] so
/// stored records remain decryptable if the default ever changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfAlgorithm {
    #[serde(rename = "PBKDF2-SHA256")]
    Pbkdf2Sha256,
}

/// Parameters for deriving a key from a password.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: KdfAlgorithm,
    pub iterations: u32,
    pub salt: Salt,
    pub key_len: usize,
}

impl KdfParams {
    /// Fresh parameters with a random salt and the current defaults.
    pub fn generate() -> Self {
        Self {
            algorithm: KdfAlgorithm::Pbkdf2Sha256,
            iterations: DEFAULT_ITERATIONS,
            salt: Salt::random(),
            key_len: KEY_SIZE,
        }
    }

    /// Low-iteration parameters for tests. Not for production use.
    pub fn fast_insecure() -> Self {
        Self {
            iterations: 100,
            ..Self::generate()
        }
    }
}

/// A 256-bit symmetric key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material never reaches logs.
        f.write_str("DerivedKey(..)")
    }
}

/// Derives a key from a password using the given parameters.
pub fn derive_key(password: &str, params: &KdfParams) -> CryptoResult<DerivedKey> {
    if params.key_len != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: params.key_len,
        });
    }
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be non-zero".to_string(),
        ));
    }

    let mut out = [0u8; KEY_SIZE];
    match params.algorithm {
        KdfAlgorithm::Pbkdf2Sha256 => pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            params.salt.as_bytes(),
            params.iterations,
            &mut out,
        ),
    }
    Ok(DerivedKey(out))
}

/// Generates a random data key from the OS RNG.
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    DerivedKey(bytes)
}
