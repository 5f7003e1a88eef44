//! Auth records: what the server stores instead of a password.
//!
//! A record holds the KDF parameters for the master key and the SRP
//! verifier. For unknown emails the server answers with a simulated record
//! derived deterministically from a server secret, so `initAuth` reveals
//! nothing about account existence.

use crate::error::Result;
use crate::marshal::Storable;
use crate::srp::{private_exponent, SrpGroup};
use keyfold_crypto::{derive_key, mac, DerivedKey, KdfAlgorithm, KdfParams, Salt, SALT_SIZE};
use num_bigint_dig::BigUint;
use serde::{Deserialize, Serialize};

/// Server-side authentication record for one account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthRecord {
    pub account_id: String,
    pub email: String,
    /// KDF parameters the client needs to re-derive its master key.
    pub kdf_params: KdfParams,
    /// SRP verifier `v = g^x mod N`, padded to group length.
    #[serde(with = "keyfold_crypto::b64")]
    pub verifier: Vec<u8>,
}

impl AuthRecord {
    /// Builds a record from a password using fresh KDF parameters.
    pub fn new(account_id: &str, email: &str, password: &str) -> Result<Self> {
        Self::with_params(account_id, email, password, KdfParams::generate())
    }

    pub fn with_params(
        account_id: &str,
        email: &str,
        password: &str,
        kdf_params: KdfParams,
    ) -> Result<Self> {
        let x = client_exponent(password, &kdf_params)?;
        let verifier = SrpGroup::default().verifier(&x);
        Ok(Self {
            account_id: account_id.to_string(),
            email: email.to_string(),
            kdf_params,
            verifier,
        })
    }

    /// Deterministic simulated record for an email with no account.
    ///
    /// Salt, account id and verifier are all drawn from HMACs of the email
    /// under the server secret, so repeated queries return the same record
    /// and its marshaled shape matches a real one byte-length for
    /// byte-length.
    pub fn simulated(server_secret: &[u8], email: &str) -> Self {
        let tag = |label: &str| mac::authenticate(server_secret, format!("{label}:{email}").as_bytes());

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&tag("auth-salt")[..SALT_SIZE]);

        let account_id = hex::encode(&tag("auth-id")[..16]);

        let x = BigUint::from_bytes_be(&tag("auth-verifier"));
        let verifier = SrpGroup::default().verifier(&x);

        Self {
            account_id,
            email: email.to_string(),
            kdf_params: KdfParams {
                algorithm: KdfAlgorithm::Pbkdf2Sha256,
                iterations: 100_000,
                salt: Salt::from_bytes(salt),
                key_len: 32,
            },
            verifier,
        }
    }
}

impl Storable for AuthRecord {
    const KIND: &'static str = "auth";
    fn id(&self) -> &str {
        &self.account_id
    }
}

/// The client's SRP private value `x` from password and KDF parameters.
pub fn client_exponent(password: &str, kdf_params: &KdfParams) -> Result<BigUint> {
    let key: DerivedKey = derive_key(password, kdf_params)?;
    Ok(private_exponent(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfold_crypto::KdfParams;

    #[test]
    fn record_matches_password() {
        let params = KdfParams::fast_insecure();
        let record = AuthRecord::with_params("acc-1", "a@x", "pw1", params.clone()).unwrap();

        let x = client_exponent("pw1", &record.kdf_params).unwrap();
        assert_eq!(record.verifier, SrpGroup::default().verifier(&x));

        let wrong = client_exponent("pw2", &record.kdf_params).unwrap();
        assert_ne!(record.verifier, SrpGroup::default().verifier(&wrong));
    }

    #[test]
    fn simulated_record_is_deterministic() {
        let secret = b"server-secret";
        let a = AuthRecord::simulated(secret, "ghost@x");
        let b = AuthRecord::simulated(secret, "ghost@x");
        assert_eq!(a.verifier, b.verifier);
        assert_eq!(a.kdf_params, b.kdf_params);
        assert_eq!(a.account_id, b.account_id);
    }

    #[test]
    fn simulated_record_shape_matches_real_one() {
        let real = AuthRecord::with_params("acc-1", "a@x", "pw1", KdfParams::fast_insecure()).unwrap();
        let simulated = AuthRecord::simulated(b"server-secret", "ghost@x");

        assert_eq!(real.verifier.len(), simulated.verifier.len());
        assert_eq!(real.account_id.len(), simulated.account_id.len());
        assert_eq!(
            real.kdf_params.salt.as_bytes().len(),
            simulated.kdf_params.salt.as_bytes().len()
        );
    }

    #[test]
    fn different_emails_simulate_differently() {
        let secret = b"server-secret";
        let a = AuthRecord::simulated(secret, "ghost1@x");
        let b = AuthRecord::simulated(secret, "ghost2@x");
        assert_ne!(a.verifier, b.verifier);
    }
}
