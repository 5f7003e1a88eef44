//! Cryptographic primitives for keyfold.
//!
//! Provides the raw operations the trust spine is built from:
//! - PBKDF2-HMAC-SHA256 for key derivation from passwords
//! - AES-256-GCM for authenticated encryption
//! - RSA-2048-OAEP for wrapping data keys to accessor public keys
//! - RSA-PSS for organization signatures
//! - HMAC-SHA256 for invite tokens and simulated auth records
//!
//! # Architecture
//!
//! Encryption uses a two-tier key system:
//!
//! 1. **Master Key**: Derived from the user's password using PBKDF2.
//!    This key is never stored - it's derived each time the user unlocks.
//!
//! 2. **Data Key**: A random key generated for each shared container.
//!    The data key is wrapped (RSA-OAEP) once per accessor public key and
//!    stored alongside the encrypted payload.
//!
//! This architecture allows:
//! - Changing the password without re-encrypting shared data
//! - Sharing a container by wrapping just its data key
//! - Revocation by explicit data-key rotation

pub mod b64;
mod cipher;
pub mod envelope;
mod error;
mod key;
pub mod mac;
pub mod signing;

pub use cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use envelope::{
    generate_keypair, open_key, seal_key, Fingerprint, PrivateKey, PublicKey, WrappedKey,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    derive_key, generate_random_key, random_bytes, DerivedKey, KdfAlgorithm, KdfParams, Salt,
    KEY_SIZE, SALT_SIZE,
};
pub use signing::{sign, verify, HashAlgorithm, Signature, SigningParams};
