//! Shared containers: data encrypted under a per-container key that is
//! wrapped once per accessor.
//!
//! A container never owns its accessors - the table stores weak references
//! (id, public key, fingerprint) plus the wrapped data key. Whoever can
//! unwrap an entry with the matching private key can read the payload;
//! nobody else learns anything, including the server storing the container.
//!
//! Mutations stage a complete replacement state and swap it in, so a reader
//! either sees the old accessor table with the old payload or the new table
//! with the new payload, never a mix.

use crate::error::{Error, Result};
use keyfold_crypto::{
    decrypt, encrypt, generate_random_key, seal_key, DerivedKey, EncryptedData, Fingerprint,
    PublicKey, WrappedKey,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A principal entitled to appear in an accessor table.
pub trait Accessor {
    fn accessor_id(&self) -> &str;

    /// The accessor's current public key. Errors if the accessor has not
    /// generated keys yet (possible for groups).
    fn public_key(&self) -> Result<&PublicKey>;
}

/// An accessor that is currently able to act: its private key is loaded.
pub trait ActiveAccessor: Accessor {
    /// Unwraps a data key that was wrapped for this accessor.
    fn unwrap_key(&self, wrapped: &WrappedKey) -> Result<DerivedKey>;
}

/// One row of the accessor table.
///
/// The fingerprint is recorded at wrap time; `access` refuses to proceed if
/// the accessor later presents a different public key (trust-on-first-use).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessorEntry {
    pub id: String,
    pub public_key: PublicKey,
    pub fingerprint: Fingerprint,
    pub wrapped_key: WrappedKey,
}

/// Data encrypted under a symmetric key wrapped for a set of accessors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SharedContainer {
    id: String,
    accessors: Vec<AccessorEntry>,
    payload: Option<EncryptedData>,
    /// The data key, present only after `access` (or on the creating
    /// client). Never serialized.
    #[serde(skip)]
    key: Option<DerivedKey>,
}

impl SharedContainer {
    pub fn new(id: String) -> Self {
        Self {
            id,
            accessors: Vec::new(),
            payload: None,
            key: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the data key is currently loaded.
    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    pub fn accessors(&self) -> &[AccessorEntry] {
        &self.accessors
    }

    pub fn has_accessor(&self, id: &str) -> bool {
        self.accessors.iter().any(|e| e.id == id)
    }

    /// The data key, generating one if this container has never held data
    /// or accessors. A container restored from storage must be `access`ed
    /// before it can produce its key.
    fn require_key(&mut self) -> Result<DerivedKey> {
        if let Some(key) = &self.key {
            return Ok(key.clone());
        }
        if self.payload.is_some() || !self.accessors.is_empty() {
            return Err(Error::InvalidRequest(
                "container is locked; call access first".to_string(),
            ));
        }
        let key = generate_random_key();
        self.key = Some(key.clone());
        Ok(key)
    }

    /// Seals a plaintext payload under the data key. The container id is
    /// bound into the AEAD tag, and a fresh nonce is drawn per seal.
    pub fn set_data(&mut self, plaintext: &[u8]) -> Result<()> {
        let key = self.require_key()?;
        let sealed = encrypt(&key, plaintext, self.id.as_bytes())?;
        self.payload = Some(sealed);
        Ok(())
    }

    /// Opens the payload. Requires a prior `access` (or local `set_data`).
    pub fn get_data(&self) -> Result<Vec<u8>> {
        let key = self.key.as_ref().ok_or_else(|| {
            Error::InvalidRequest("container is locked; call access first".to_string())
        })?;
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| Error::NotFound(format!("payload of container {}", self.id)))?;
        Ok(decrypt(key, payload, self.id.as_bytes())?)
    }

    /// Replaces the accessor table, wrapping the data key for each accessor.
    ///
    /// The key does NOT rotate when accessors are removed; a removed
    /// accessor that has seen the key could still decrypt the current
    /// payload. Revocation that must hold against key retention is
    /// [`SharedContainer::rotate_key`].
    pub fn update_accessors(&mut self, accessors: &[&dyn Accessor]) -> Result<()> {
        let key = self.require_key()?;

        let mut staged: Vec<AccessorEntry> = Vec::with_capacity(accessors.len());
        for accessor in accessors {
            let id = accessor.accessor_id();
            if staged.iter().any(|e| e.id == id) {
                return Err(Error::InvalidRequest(format!(
                    "duplicate accessor {id} in container {}",
                    self.id
                )));
            }
            let public_key = accessor.public_key()?.clone();
            staged.push(AccessorEntry {
                id: id.to_string(),
                fingerprint: public_key.fingerprint()?,
                wrapped_key: seal_key(&public_key, &key)?,
                public_key,
            });
        }

        if staged.len() < self.accessors.len() {
            warn!(
                container = %self.id,
                "accessor set shrank without key rotation; removed accessors can still \
                 decrypt the current payload"
            );
        }

        // Single swap: readers see the old table or the complete new one.
        self.accessors = staged;
        debug!(container = %self.id, accessors = self.accessors.len(), "accessor table replaced");
        Ok(())
    }

    /// Generates a new data key, re-seals the payload and re-wraps for every
    /// current accessor. All three fields swap together.
    pub fn rotate_key(&mut self) -> Result<()> {
        if self.key.is_none() {
            return Err(Error::InvalidRequest(
                "container is locked; call access first".to_string(),
            ));
        }

        let plaintext = match &self.payload {
            Some(_) => Some(self.get_data()?),
            None => None,
        };

        let new_key = generate_random_key();
        let new_payload = match &plaintext {
            Some(p) => Some(encrypt(&new_key, p, self.id.as_bytes())?),
            None => None,
        };

        let mut staged: Vec<AccessorEntry> = Vec::with_capacity(self.accessors.len());
        for entry in &self.accessors {
            staged.push(AccessorEntry {
                id: entry.id.clone(),
                public_key: entry.public_key.clone(),
                fingerprint: entry.fingerprint,
                wrapped_key: seal_key(&entry.public_key, &new_key)?,
            });
        }

        self.key = Some(new_key);
        self.payload = new_payload;
        self.accessors = staged;
        debug!(container = %self.id, "data key rotated");
        Ok(())
    }

    /// Unlocks the container as the given accessor: finds its table entry,
    /// checks the recorded fingerprint against the key the accessor presents
    /// now, and unwraps the data key.
    pub fn access(&mut self, accessor: &dyn ActiveAccessor) -> Result<()> {
        let id = accessor.accessor_id();
        let entry = self
            .accessors
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::MissingAccess(id.to_string()))?;

        let current = accessor.public_key()?.fingerprint()?;
        if current != entry.fingerprint {
            return Err(Error::KeyMismatch(id.to_string()));
        }

        let key = accessor.unwrap_key(&entry.wrapped_key)?;
        self.key = Some(key);
        Ok(())
    }

    /// Drops the data key from memory (zeroized on drop).
    pub fn lock(&mut self) {
        self.key = None;
    }
}
