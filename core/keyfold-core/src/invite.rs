//! Invites: joining an org without prior public-key trust.
//!
//! The token is an HMAC under the org's `invitesKey` over the invite's
//! email, id and expiry. The invitee proves possession of the token (relayed
//! out-of-band) and the server re-verifies it under the same key. Invites
//! are one-shot and expire.

use crate::error::{Error, Result};
use crate::group::SignedPublicKey;
use crate::marshal::Storable;
use chrono::{DateTime, Duration, Utc};
use keyfold_crypto::mac;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// An outstanding invitation to join an org (optionally toward a specific
/// vault).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Invite {
    pub id: String,
    /// The org this invite enrolls into, by id.
    pub org: String,
    /// Optional target vault, by id.
    pub vault: Option<String>,
    pub email: String,
    pub expires: DateTime<Utc>,
    #[serde(with = "keyfold_crypto::b64")]
    pub token: Vec<u8>,
    /// Org signature over the token, attached when the creating client has
    /// the org signing key loaded.
    pub signature: Option<SignedPublicKey>,
    /// Set on acceptance; a used invite never verifies again.
    pub accepted: bool,
}

impl Invite {
    pub fn new(
        invites_key: &[u8],
        org: &str,
        vault: Option<String>,
        email: &str,
        ttl_secs: i64,
    ) -> Self {
        let id = crate::random_id();
        let expires = Utc::now() + Duration::seconds(ttl_secs);
        let token = mac::authenticate(invites_key, &token_message(email, &id, &expires)).to_vec();
        Self {
            id,
            org: org.to_string(),
            vault,
            email: email.to_string(),
            expires,
            token,
            signature: None,
            accepted: false,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires
    }

    /// Recomputes the token under the given key and checks it against the
    /// stored one. Fails `InviteExpired` for stale or already-used invites.
    pub fn verify(&self, invites_key: &[u8]) -> Result<()> {
        if self.accepted || self.is_expired() {
            return Err(Error::InviteExpired);
        }
        let message = token_message(&self.email, &self.id, &self.expires);
        if !mac::verify(invites_key, &message, &self.token) {
            return Err(Error::AuthenticationFailed);
        }
        Ok(())
    }

    /// Constant-time check of the invitee's proof against the token.
    pub fn matches_proof(&self, proof: &[u8]) -> bool {
        proof.len() == self.token.len() && bool::from(proof.ct_eq(&self.token))
    }
}

/// Canonical token input: `email || id || expires` with a fixed separator.
fn token_message(email: &str, id: &str, expires: &DateTime<Utc>) -> Vec<u8> {
    format!("{email}|{id}|{}", expires.timestamp()).into_bytes()
}

impl Storable for Invite {
    const KIND: &'static str = "invite";
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_verifies_under_issuing_key() {
        let invite = Invite::new(b"invites-key", "org-1", None, "c@x", 3600);
        invite.verify(b"invites-key").unwrap();
    }

    #[test]
    fn wrong_key_fails() {
        let invite = Invite::new(b"invites-key", "org-1", None, "c@x", 3600);
        assert!(invite.verify(b"other-key").is_err());
    }

    #[test]
    fn expired_invite_fails() {
        let invite = Invite::new(b"invites-key", "org-1", None, "c@x", -1);
        let err = invite.verify(b"invites-key").unwrap_err();
        assert_eq!(err.code(), "InviteExpired");
    }

    #[test]
    fn accepted_invite_fails_replay() {
        let mut invite = Invite::new(b"invites-key", "org-1", None, "c@x", 3600);
        invite.verify(b"invites-key").unwrap();
        invite.accepted = true;
        let err = invite.verify(b"invites-key").unwrap_err();
        assert_eq!(err.code(), "InviteExpired");
    }

    #[test]
    fn proof_comparison_is_exact() {
        let invite = Invite::new(b"invites-key", "org-1", None, "c@x", 3600);
        assert!(invite.matches_proof(&invite.token));

        let mut wrong = invite.token.clone();
        wrong[0] ^= 0x01;
        assert!(!invite.matches_proof(&wrong));
        assert!(!invite.matches_proof(&invite.token[..16]));
    }

    #[test]
    fn tampered_email_invalidates_token() {
        let mut invite = Invite::new(b"invites-key", "org-1", None, "c@x", 3600);
        invite.email = "attacker@x".to_string();
        assert!(invite.verify(b"invites-key").is_err());
    }
}
