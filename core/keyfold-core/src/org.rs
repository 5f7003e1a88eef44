//! Organizations: an admin-signed PKI layered over shared containers.
//!
//! The org container's payload is the signing private key plus the invite
//! HMAC key. Its only accessor is the admin group, so reaching org secrets
//! always goes account -> admin group -> org. The dependency is acyclic at
//! the trust level: admin-group accessors are accounts.
//!
//! Any consumer that will trust a member's or group's public key MUST check
//! the org signature over it first - an unsigned key wraps nothing and
//! verifies nothing.

use crate::account::Account;
use crate::container::{Accessor, SharedContainer};
use crate::error::{Error, Result};
use crate::group::{Group, SignedPublicKey};
use crate::invite::Invite;
use crate::marshal::{self, Storable};
use crate::vault::{Vault, VaultSummary};
use keyfold_crypto::{sign, verify, PrivateKey, PublicKey, SigningParams};
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

/// Invite HMAC key length in bytes.
const INVITES_KEY_SIZE: usize = 32;

/// The org container payload: signing private key + invite HMAC key.
#[derive(Serialize, Deserialize)]
struct OrgSecrets {
    #[serde(with = "keyfold_crypto::b64")]
    private_key: Vec<u8>,
    #[serde(with = "keyfold_crypto::b64")]
    invites_key: Vec<u8>,
}

/// A member record: the account's identity plus its org-signed public key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrgMember {
    pub id: String,
    pub name: String,
    pub email: String,
    pub public_key: PublicKey,
    pub signed_public_key: Option<SignedPublicKey>,
}

impl OrgMember {
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
            public_key: account.public_key.clone(),
            signed_public_key: None,
        }
    }
}

impl Accessor for OrgMember {
    fn accessor_id(&self) -> &str {
        &self.id
    }

    fn public_key(&self) -> Result<&PublicKey> {
        Ok(&self.public_key)
    }
}

/// A group of accounts with shared vaults, governed by an admin group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Org {
    pub name: String,
    /// The org signing public key, set by `initialize`.
    pub public_key: Option<PublicKey>,
    pub signing_params: SigningParams,
    pub members: Vec<OrgMember>,
    pub admin_group: Group,
    pub everyone_group: Group,
    pub vaults: Vec<VaultSummary>,
    container: SharedContainer,
    #[serde(skip)]
    private: Option<PrivateKey>,
    #[serde(skip)]
    invites_key: Option<Zeroizing<Vec<u8>>>,
}

impl Org {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            public_key: None,
            signing_params: SigningParams::default(),
            members: Vec::new(),
            admin_group: Group::new("Admins"),
            everyone_group: Group::new("Everyone"),
            vaults: Vec::new(),
            container: SharedContainer::new(crate::random_id()),
            private: None,
            invites_key: None,
        }
    }

    pub fn id(&self) -> &str {
        self.container.id()
    }

    /// Whether `initialize` has completed. An org without a sealed payload
    /// is treated as not yet existing: `access` fails on it.
    pub fn is_initialized(&self) -> bool {
        self.public_key.is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        self.private.is_some()
    }

    /// Bootstraps the org with `account` as its first admin and member.
    ///
    /// Runs entirely in memory; callers persist the org only after this
    /// returns `Ok`, so a partially initialized org is never observable.
    pub fn initialize(&mut self, account: &Account) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::AlreadyExists(format!("org {}", self.name)));
        }

        // Admin group: keypair sealed under the founding account's key.
        self.admin_group.generate_keys()?;
        self.admin_group.update_accessors(&[account])?;

        // The admin group is the org container's sole accessor, so org
        // secrets are reachable only through admin-group membership.
        self.container.update_accessors(&[&self.admin_group])?;

        // Org signing keypair + invite HMAC key, sealed as the payload.
        let (public, private) = keyfold_crypto::generate_keypair()?;
        let invites_key = Zeroizing::new(keyfold_crypto::random_bytes(INVITES_KEY_SIZE));
        let secrets = OrgSecrets {
            private_key: private.to_der()?.to_vec(),
            invites_key: invites_key.to_vec(),
        };
        self.container.set_data(&marshal::to_bytes(&secrets)?)?;
        self.public_key = Some(public);
        self.private = Some(private);
        self.invites_key = Some(invites_key);

        // Founding account becomes the first signed member; the everyone
        // group mirrors the member list from here on.
        self.everyone_group.generate_keys()?;
        self.add_member(OrgMember::from_account(account))?;

        let admin_signed = self.sign_key(self.admin_group.public_key()?)?;
        self.admin_group.signed_public_key = Some(admin_signed);
        let everyone_signed = self.sign_key(self.everyone_group.public_key()?)?;
        self.everyone_group.signed_public_key = Some(everyone_signed);

        info!(org = %self.container.id(), "org initialized");
        Ok(())
    }

    /// Unlocks org secrets as an admin: account -> admin group -> org.
    /// Also unlocks the everyone group when the account is a member, so the
    /// member list can be maintained afterwards.
    pub fn access(&mut self, account: &Account) -> Result<()> {
        if !self.is_initialized() {
            return Err(Error::NotFound(format!("org {}", self.name)));
        }

        self.admin_group.access(account)?;
        self.container.access(&self.admin_group)?;

        let payload = self.container.get_data()?;
        let secrets: OrgSecrets = marshal::from_bytes(&payload)?;
        self.private = Some(PrivateKey::from_der(&secrets.private_key)?);
        self.invites_key = Some(Zeroizing::new(secrets.invites_key));

        if self.everyone_group.has_accessor(&account.id) {
            self.everyone_group.access(account)?;
        }
        Ok(())
    }

    /// Drops all org secrets from memory.
    pub fn lock(&mut self) {
        self.private = None;
        self.invites_key = None;
        self.admin_group.lock();
        self.everyone_group.lock();
        self.container.lock();
    }

    /// Signs the member's public key and enrolls it, keeping the everyone
    /// group's accessor set equal to the member list.
    ///
    /// Requires org secrets in memory (`access` first).
    pub fn add_member(&mut self, mut member: OrgMember) -> Result<()> {
        if self.private.is_none() {
            return Err(Error::InsufficientPermissions);
        }
        if self.members.iter().any(|m| m.id == member.id) {
            return Err(Error::AlreadyExists(format!("member {}", member.email)));
        }

        member.signed_public_key = Some(self.sign_key(&member.public_key)?);
        info!(org = %self.container.id(), member = %member.id, "member added");
        self.members.push(member);
        self.sync_everyone_group()
    }

    /// Enrolls a member accepted through an invite. The server cannot sign
    /// (it never holds the org private key), so the record stays unsigned
    /// until an admin runs [`Org::sign_pending_members`].
    pub fn enroll_pending_member(&mut self, member: OrgMember) -> Result<()> {
        if self.members.iter().any(|m| m.id == member.id) {
            return Err(Error::AlreadyExists(format!("member {}", member.email)));
        }
        self.members.push(member);
        Ok(())
    }

    /// Signs every unsigned member record and re-syncs the everyone group.
    /// Run by an admin client after invite acceptances.
    pub fn sign_pending_members(&mut self) -> Result<()> {
        if self.private.is_none() {
            return Err(Error::InsufficientPermissions);
        }
        let pending: Vec<usize> = self
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.signed_public_key.is_none())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        for index in pending {
            let signed = self.sign_key(&self.members[index].public_key)?;
            self.members[index].signed_public_key = Some(signed);
        }
        self.sync_everyone_group()
    }

    fn sync_everyone_group(&mut self) -> Result<()> {
        let accessors: Vec<&dyn Accessor> =
            self.members.iter().map(|m| m as &dyn Accessor).collect();
        self.everyone_group.update_accessors(&accessors)
    }

    fn sign_key(&self, subject: &PublicKey) -> Result<SignedPublicKey> {
        let private = self.private.as_ref().ok_or(Error::InsufficientPermissions)?;
        let signature = sign(private, &subject.to_der()?, &self.signing_params)?;
        Ok(SignedPublicKey {
            signature,
            params: self.signing_params,
        })
    }

    fn verify_key(&self, subject: &PublicKey, signed: &Option<SignedPublicKey>) -> Result<bool> {
        let org_key = self
            .public_key
            .as_ref()
            .ok_or_else(|| Error::NotFound(format!("org {}", self.name)))?;
        let Some(signed) = signed else {
            return Ok(false);
        };
        Ok(verify(
            org_key,
            &signed.signature,
            &subject.to_der()?,
            &signed.params,
        )?)
    }

    /// Checks a member's public key against the org signature over it.
    pub fn verify_member(&self, member: &OrgMember) -> Result<bool> {
        Ok(self.members.iter().any(|m| m.id == member.id)
            && self.verify_key(&member.public_key, &member.signed_public_key)?)
    }

    /// Checks a group's public key against the org signature over it.
    pub fn verify_group(&self, group: &Group) -> Result<bool> {
        self.verify_key(group.public_key()?, &group.signed_public_key)
    }

    /// Signs an existing group's public key (e.g. a newly created team
    /// group). Requires org secrets in memory.
    pub fn sign_group(&self, group: &mut Group) -> Result<()> {
        let signed = self.sign_key(group.public_key()?)?;
        group.signed_public_key = Some(signed);
        Ok(())
    }

    /// Creates an org vault with the admin group as its sole accessor.
    /// Further groups are granted by subsequent `update_accessors` calls.
    pub fn create_vault(&mut self, name: &str) -> Result<Vault> {
        if self.private.is_none() {
            return Err(Error::InsufficientPermissions);
        }
        let mut vault = Vault::new(name, Some(self.container.id().to_string()));
        vault.update_accessors(&[&self.admin_group])?;
        self.vaults.push(vault.summary());
        info!(org = %self.container.id(), vault = %vault.id(), "org vault created");
        Ok(vault)
    }

    /// Issues an invite for an email address. Requires org secrets in
    /// memory; the token is signed with the org key so clients can check
    /// provenance before trusting the invite's contents.
    pub fn create_invite(
        &self,
        email: &str,
        vault: Option<String>,
        ttl_secs: i64,
    ) -> Result<Invite> {
        let invites_key = self
            .invites_key
            .as_ref()
            .ok_or(Error::InsufficientPermissions)?;
        let mut invite = Invite::new(invites_key, self.container.id(), vault, email, ttl_secs);
        let private = self.private.as_ref().ok_or(Error::InsufficientPermissions)?;
        let signature = sign(private, &invite.token, &self.signing_params)?;
        invite.signature = Some(SignedPublicKey {
            signature,
            params: self.signing_params,
        });
        Ok(invite)
    }

    /// Recomputes an invite's token under the org's `invitesKey`.
    pub fn verify_invite(&self, invite: &Invite) -> Result<()> {
        let invites_key = self
            .invites_key
            .as_ref()
            .ok_or(Error::InsufficientPermissions)?;
        if invite.org != self.container.id() {
            return Err(Error::InvalidRequest(
                "invite belongs to a different org".to_string(),
            ));
        }
        invite.verify(invites_key)
    }
}

impl Storable for Org {
    const KIND: &'static str = "org";
    fn id(&self) -> &str {
        self.container.id()
    }
}
