//! RSA-PSS signatures for organization-issued public keys.
//!
//! The parameters identifying the concrete scheme travel with every signed
//! object, so verification never depends on an ambient default.

use crate::envelope::{PrivateKey, PublicKey};
use crate::error::{CryptoError, CryptoResult};
use rsa::Pss;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash function used for both the message digest and the MGF.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA-256")]
    Sha256,
}

/// Concrete signing scheme: RSA-PSS with the named hash and salt length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningParams {
    pub hash: HashAlgorithm,
    pub salt_len: usize,
}

impl Default for SigningParams {
    fn default() -> Self {
        Self {
            hash: HashAlgorithm::Sha256,
            salt_len: 32,
        }
    }
}

/// A detached signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "crate::b64")] pub Vec<u8>);

/// Signs a message with RSA-PSS under the given parameters.
pub fn sign(private: &PrivateKey, msg: &[u8], params: &SigningParams) -> CryptoResult<Signature> {
    let digest = match params.hash {
        HashAlgorithm::Sha256 => Sha256::digest(msg),
    };
    let sig = private
        .inner()
        .sign_with_rng(
            &mut rand::rngs::OsRng,
            Pss::new_with_salt::<Sha256>(params.salt_len),
            &digest,
        )
        .map_err(|e| CryptoError::Signing(format!("PSS sign failed: {e}")))?;
    Ok(Signature(sig))
}

/// Verifies a signature. Returns `false` on any mismatch; only malformed
/// inputs (bad key material) produce an error.
pub fn verify(
    public: &PublicKey,
    sig: &Signature,
    msg: &[u8],
    params: &SigningParams,
) -> CryptoResult<bool> {
    let digest = match params.hash {
        HashAlgorithm::Sha256 => Sha256::digest(msg),
    };
    Ok(public
        .inner()
        .verify(
            Pss::new_with_salt::<Sha256>(params.salt_len),
            &digest,
            &sig.0,
        )
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::generate_keypair;

    #[test]
    fn sign_verify_roundtrip() {
        let (public, private) = generate_keypair().unwrap();
        let params = SigningParams::default();
        let sig = sign(&private, b"member public key", &params).unwrap();
        assert!(verify(&public, &sig, b"member public key", &params).unwrap());
    }

    #[test]
    fn modified_message_fails() {
        let (public, private) = generate_keypair().unwrap();
        let params = SigningParams::default();
        let sig = sign(&private, b"member public key", &params).unwrap();
        assert!(!verify(&public, &sig, b"member public kez", &params).unwrap());
    }

    #[test]
    fn wrong_signer_fails() {
        let (_, private) = generate_keypair().unwrap();
        let (other_public, _) = generate_keypair().unwrap();
        let params = SigningParams::default();
        let sig = sign(&private, b"msg", &params).unwrap();
        assert!(!verify(&other_public, &sig, b"msg", &params).unwrap());
    }
}
