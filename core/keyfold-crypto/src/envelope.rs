//! Key wrapping for shared-container accessors.
//!
//! Each container's data key is wrapped with RSA-2048-OAEP(SHA-256) once per
//! accessor public key. Public keys travel as SPKI DER (base64 on the wire);
//! the SHA-256 digest of the DER is the trust-on-first-use fingerprint stored
//! in accessor tables to detect key substitution.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// RSA modulus size. 2048 keeps accessor tables compact; wrap/unwrap is the
/// hot path when accessor sets change.
const RSA_BITS: usize = 2048;

/// SHA-256 digest of a public key's SPKI DER encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

/// An accessor's long-term RSA public key.
#[derive(Clone, PartialEq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        RsaPublicKey::from_public_key_der(der)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(format!("bad public key encoding: {e}")))
    }

    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        Ok(self
            .0
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidKey(format!("public key encoding failed: {e}")))?
            .as_bytes()
            .to_vec())
    }

    /// SHA-256 over the SPKI DER encoding.
    pub fn fingerprint(&self) -> CryptoResult<Fingerprint> {
        let der = self.to_der()?;
        let digest = Sha256::digest(&der);
        Ok(Fingerprint(digest.into()))
    }

    pub(crate) fn inner(&self) -> &RsaPublicKey {
        &self.0
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fingerprint() {
            Ok(fp) => write!(f, "PublicKey({fp})"),
            Err(_) => f.write_str("PublicKey(?)"),
        }
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let der = self.to_der().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&crate::b64::encode(&der))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let der = crate::b64::decode(&s).map_err(serde::de::Error::custom)?;
        Self::from_der(&der).map_err(serde::de::Error::custom)
    }
}

/// An accessor's long-term RSA private key.
///
/// `RsaPrivateKey` zeroizes its material on drop (from the rsa crate).
/// Never serialized directly - it travels only inside an AEAD envelope
/// sealed under a password-derived master key.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKey(format!("bad private key encoding: {e}")))
    }

    /// PKCS#8 DER encoding, zeroized when the return value drops.
    pub fn to_der(&self) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let doc = self
            .0
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKey(format!("private key encoding failed: {e}")))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(RsaPublicKey::from(&self.0))
    }

    pub(crate) fn inner(&self) -> &RsaPrivateKey {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// A data key wrapped to one accessor's public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey(#[serde(with = "crate::b64")] pub Vec<u8>);

/// Generates a fresh RSA keypair.
pub fn generate_keypair() -> CryptoResult<(PublicKey, PrivateKey)> {
    let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, RSA_BITS)
        .map_err(|e| CryptoError::InvalidKey(format!("keypair generation failed: {e}")))?;
    let public = PublicKey(RsaPublicKey::from(&private));
    Ok((public, PrivateKey(private)))
}

/// Wraps a data key to a recipient public key with RSA-OAEP(SHA-256).
pub fn seal_key(recipient: &PublicKey, key: &DerivedKey) -> CryptoResult<WrappedKey> {
    let blob = recipient
        .inner()
        .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha256>(), key.as_bytes())
        .map_err(|e| CryptoError::Encryption(format!("key wrap failed: {e}")))?;
    Ok(WrappedKey(blob))
}

/// Unwraps a data key with the recipient's private key.
///
/// Failure means the blob was wrapped for a different key or tampered with;
/// callers treat it as fatal, never as something to retry or paper over.
pub fn open_key(private: &PrivateKey, wrapped: &WrappedKey) -> CryptoResult<DerivedKey> {
    let plaintext = Zeroizing::new(
        private
            .inner()
            .decrypt(Oaep::new::<Sha256>(), &wrapped.0)
            .map_err(|_| CryptoError::Unwrap("wrong private key or corrupted blob".to_string()))?,
    );
    DerivedKey::from_slice(&plaintext)
}
