//! User accounts: a long-term keypair whose private half lives in an AEAD
//! envelope sealed under a password-derived master key.
//!
//! The master key is never stored - it's derived each time the user unlocks.
//! Changing the password re-seals only the envelope; data shared with this
//! account stays wrapped to the unchanged public key.

use crate::container::{Accessor, ActiveAccessor};
use crate::error::{Error, Result};
use crate::marshal::Storable;
use chrono::{DateTime, Utc};
use keyfold_crypto::{
    decrypt, derive_key, encrypt, generate_keypair, open_key, DerivedKey, EncryptedData, KdfParams,
    PrivateKey, PublicKey, WrappedKey,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A user identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub name: String,
    pub public_key: PublicKey,
    /// KDF parameters for the master key protecting `encrypted_priv`.
    pub key_params: KdfParams,
    /// The private key's PKCS#8 DER, AEAD-sealed under the master key.
    pub encrypted_priv: EncryptedData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    private: Option<PrivateKey>,
}

impl Account {
    /// Creates an account: fresh keypair, fresh KDF salt, private key sealed
    /// under the password-derived master key. The account starts unlocked.
    pub fn new(email: &str, name: &str, password: &str) -> Result<Self> {
        Self::with_params(email, name, password, KdfParams::generate())
    }

    pub fn with_params(
        email: &str,
        name: &str,
        password: &str,
        key_params: KdfParams,
    ) -> Result<Self> {
        let id = crate::random_id();
        let (public_key, private) = generate_keypair()?;
        let master = derive_key(password, &key_params)?;
        let encrypted_priv = seal_private(&private, &master, &id)?;
        let now = Utc::now();

        Ok(Self {
            id,
            email: email.to_string(),
            name: name.to_string(),
            public_key,
            key_params,
            encrypted_priv,
            created_at: now,
            updated_at: now,
            private: Some(private),
        })
    }

    /// Derives the master key and opens the private-key envelope.
    pub fn unlock(&mut self, password: &str) -> Result<()> {
        let master = derive_key(password, &self.key_params)?;
        let der = Zeroizing::new(
            decrypt(&master, &self.encrypted_priv, self.id.as_bytes())
                .map_err(|_| Error::AuthenticationFailed)?,
        );
        self.private = Some(PrivateKey::from_der(&der)?);
        Ok(())
    }

    /// Drops the private key from memory.
    pub fn lock(&mut self) {
        self.private = None;
    }

    pub fn is_unlocked(&self) -> bool {
        self.private.is_some()
    }

    /// Re-seals the envelope under a new password with fresh KDF parameters.
    /// The keypair itself is unchanged, so accessor-table entries wrapped to
    /// this account's public key stay valid.
    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<()> {
        self.unlock(old_password)?;
        self.reseal(new_password)
    }

    /// Replaces the KDF parameters and envelope in one step, preserving the
    /// keypair. Requires the private key to be loaded (an unlocked copy on
    /// some device); recovering an account whose private key is gone for
    /// good means deleting it and re-inviting.
    pub fn recover(&mut self, new_password: &str) -> Result<()> {
        if self.private.is_none() {
            return Err(Error::InvalidRequest(
                "recovery requires the private key to be loaded".to_string(),
            ));
        }
        self.reseal(new_password)
    }

    fn reseal(&mut self, password: &str) -> Result<()> {
        let private = self
            .private
            .as_ref()
            .ok_or(Error::AuthenticationFailed)?;
        let key_params = KdfParams::generate();
        let master = derive_key(password, &key_params)?;
        self.encrypted_priv = seal_private(private, &master, &self.id)?;
        self.key_params = key_params;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// The loaded private key, for signing and unwrapping.
    pub(crate) fn private_key(&self) -> Result<&PrivateKey> {
        self.private.as_ref().ok_or(Error::InsufficientPermissions)
    }
}

fn seal_private(private: &PrivateKey, master: &DerivedKey, id: &str) -> Result<EncryptedData> {
    let der = private.to_der()?;
    Ok(encrypt(master, &der, id.as_bytes())?)
}

impl Accessor for Account {
    fn accessor_id(&self) -> &str {
        &self.id
    }

    fn public_key(&self) -> Result<&PublicKey> {
        Ok(&self.public_key)
    }
}

impl ActiveAccessor for Account {
    fn unwrap_key(&self, wrapped: &WrappedKey) -> Result<DerivedKey> {
        Ok(open_key(self.private_key()?, wrapped)?)
    }
}

impl Storable for Account {
    const KIND: &'static str = "account";
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfold_crypto::KdfParams;

    fn test_account(password: &str) -> Account {
        Account::with_params("a@x", "Alice", password, KdfParams::fast_insecure()).unwrap()
    }

    #[test]
    fn new_account_starts_unlocked() {
        let account = test_account("pw1");
        assert!(account.is_unlocked());
    }

    #[test]
    fn lock_unlock_roundtrip() {
        let mut account = test_account("pw1");
        account.lock();
        assert!(!account.is_unlocked());
        account.unlock("pw1").unwrap();
        assert!(account.is_unlocked());
    }

    #[test]
    fn wrong_password_fails_unlock() {
        let mut account = test_account("pw1");
        account.lock();
        let err = account.unlock("pw2").unwrap_err();
        assert_eq!(err.code(), "AuthenticationFailed");
    }

    #[test]
    fn change_password_preserves_keypair() {
        let mut account = test_account("pw1");
        let public_before = account.public_key.clone();

        account.change_password("pw1", "pw2").unwrap();
        account.lock();
        assert!(account.unlock("pw1").is_err());
        account.unlock("pw2").unwrap();

        assert_eq!(account.public_key, public_before);
    }

    #[test]
    fn recover_requires_loaded_private_key() {
        let mut account = test_account("pw1");
        account.lock();
        assert!(account.recover("pw2").is_err());

        account.unlock("pw1").unwrap();
        account.recover("pw2").unwrap();
        account.lock();
        account.unlock("pw2").unwrap();
    }

    #[test]
    fn serialization_omits_private_key() {
        let account = test_account("pw1");
        let json = serde_json::to_string(&account).unwrap();
        let mut restored: Account = serde_json::from_str(&json).unwrap();
        assert!(!restored.is_unlocked());
        restored.unlock("pw1").unwrap();
    }
}
