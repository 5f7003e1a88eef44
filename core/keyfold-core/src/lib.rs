//! Trust spine of the keyfold credential-vault service.
//!
//! Everything here operates on the client's view of the world: plaintext is
//! only ever produced inside a [`container::SharedContainer`] after a
//! successful `access`, and the server-side types ([`auth`], [`session`])
//! never see a password or a private key.
//!
//! Layering, leaves first:
//! - [`container`] — data encrypted under a per-container key wrapped once
//!   per accessor
//! - [`account`] — a user identity owning a long-term keypair
//! - [`auth`] / [`srp`] — SRP-6a verifier records and handshakes
//! - [`session`] — short-lived credential from a successful handshake
//! - [`group`] — a container whose payload is a keypair, letting a set of
//!   accounts act as one accessor
//! - [`vault`] — a container carrying encrypted records
//! - [`org`] — admin-signed PKI over groups and vaults
//! - [`invite`] — HMAC-authenticated enrollment without prior key trust

pub mod account;
pub mod auth;
pub mod container;
mod error;
pub mod group;
pub mod invite;
pub mod marshal;
pub mod org;
pub mod session;
pub mod srp;
pub mod vault;

pub use account::Account;
pub use auth::AuthRecord;
pub use container::{Accessor, AccessorEntry, ActiveAccessor, SharedContainer};
pub use error::{Error, Result};
pub use group::{Group, SignedPublicKey};
pub use invite::Invite;
pub use marshal::Storable;
pub use org::{Org, OrgMember};
pub use session::Session;
pub use vault::{Vault, VaultSummary};

/// Generates an opaque id with 128 bits of entropy.
pub fn random_id() -> String {
    hex::encode(keyfold_crypto::random_bytes(16))
}
