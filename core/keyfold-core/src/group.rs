//! Groups: a shared container whose payload is itself a keypair.
//!
//! Possessing group membership, possessing the group private key, and being
//! able to act as the group elsewhere are the same thing: `access`ing the
//! group decrypts the keypair, and from then on the group can appear as an
//! accessor of other containers.

use crate::container::{Accessor, AccessorEntry, ActiveAccessor, SharedContainer};
use crate::error::{Error, Result};
use crate::marshal::{self, Storable};
use keyfold_crypto::{
    generate_keypair, open_key, DerivedKey, PrivateKey, PublicKey, Signature, SigningParams,
    WrappedKey,
};
use serde::{Deserialize, Serialize};

/// An org-issued signature over a subject's public key, together with the
/// parameters that identify the scheme it was made under.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedPublicKey {
    pub signature: Signature,
    pub params: SigningParams,
}

/// The container payload: the group's private key.
#[derive(Serialize, Deserialize)]
struct GroupSecrets {
    #[serde(with = "keyfold_crypto::b64")]
    private_key: Vec<u8>,
}

/// A named set of accounts acting as a single accessor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub public_key: Option<PublicKey>,
    /// Present once an org has signed this group's public key.
    pub signed_public_key: Option<SignedPublicKey>,
    container: SharedContainer,
    #[serde(skip)]
    private: Option<PrivateKey>,
}

impl Group {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            public_key: None,
            signed_public_key: None,
            container: SharedContainer::new(crate::random_id()),
            private: None,
        }
    }

    pub fn id(&self) -> &str {
        self.container.id()
    }

    /// Generates the group keypair and seals the private key as the
    /// container payload. The group stays unlocked on the creating client.
    pub fn generate_keys(&mut self) -> Result<()> {
        let (public, private) = generate_keypair()?;
        let secrets = GroupSecrets {
            private_key: private.to_der()?.to_vec(),
        };
        self.container.set_data(&marshal::to_bytes(&secrets)?)?;
        self.public_key = Some(public);
        self.private = Some(private);
        Ok(())
    }

    /// Unlocks the group as one of its member accounts and loads the group
    /// private key from the payload.
    pub fn access(&mut self, accessor: &dyn ActiveAccessor) -> Result<()> {
        self.container.access(accessor)?;
        let payload = self.container.get_data()?;
        let secrets: GroupSecrets = marshal::from_bytes(&payload)?;
        self.private = Some(PrivateKey::from_der(&secrets.private_key)?);
        Ok(())
    }

    pub fn lock(&mut self) {
        self.private = None;
        self.container.lock();
    }

    pub fn is_unlocked(&self) -> bool {
        self.private.is_some()
    }

    /// Replaces the member set. Requires the group to be unlocked (or
    /// freshly created) so the container key can be re-wrapped.
    pub fn update_accessors(&mut self, accessors: &[&dyn Accessor]) -> Result<()> {
        self.container.update_accessors(accessors)
    }

    pub fn rotate_key(&mut self) -> Result<()> {
        self.container.rotate_key()
    }

    pub fn accessors(&self) -> &[AccessorEntry] {
        self.container.accessors()
    }

    pub fn has_accessor(&self, id: &str) -> bool {
        self.container.has_accessor(id)
    }

    pub(crate) fn private_key(&self) -> Result<&PrivateKey> {
        self.private.as_ref().ok_or(Error::InsufficientPermissions)
    }
}

impl Accessor for Group {
    fn accessor_id(&self) -> &str {
        self.container.id()
    }

    fn public_key(&self) -> Result<&PublicKey> {
        self.public_key
            .as_ref()
            .ok_or_else(|| Error::InvalidRequest(format!("group {} has no keys yet", self.name)))
    }
}

impl ActiveAccessor for Group {
    fn unwrap_key(&self, wrapped: &WrappedKey) -> Result<DerivedKey> {
        Ok(open_key(self.private_key()?, wrapped)?)
    }
}

impl Storable for Group {
    const KIND: &'static str = "group";
    fn id(&self) -> &str {
        self.container.id()
    }
}
