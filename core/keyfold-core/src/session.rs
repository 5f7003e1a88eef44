//! Sessions: the short-lived credential minted by a successful handshake.

use crate::marshal::Storable;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated channel between an account and the server.
///
/// The key is the SRP session key `K`; both sides hold it after the
/// handshake and it doubles as the AEAD key for channel payloads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub account_id: String,
    #[serde(with = "keyfold_crypto::b64")]
    pub key: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(account_id: &str, key: Vec<u8>, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            id: crate::random_id(),
            account_id: account_id.to_string(),
            key,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the session will expire within the given seconds.
    pub fn expires_within_secs(&self, secs: i64) -> bool {
        Utc::now() + Duration::seconds(secs) >= self.expires_at
    }
}

impl Storable for Session {
    const KIND: &'static str = "session";
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_not_expired() {
        let session = Session::new("acc-1", vec![0u8; 32], 3600);
        assert!(!session.is_expired());
        assert!(!session.expires_within_secs(60));
        assert!(session.expires_within_secs(7200));
    }

    #[test]
    fn zero_ttl_session_is_expired() {
        let session = Session::new("acc-1", vec![0u8; 32], 0);
        assert!(session.is_expired());
    }
}
