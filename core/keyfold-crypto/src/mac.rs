//! HMAC-SHA256 authentication tags.
//!
//! Used for invite tokens and for deriving simulated auth records from a
//! server secret. Verification is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Tag length in bytes.
pub const TAG_SIZE: usize = 32;

/// Computes HMAC-SHA256 over `msg`.
pub fn authenticate(key: &[u8], msg: &[u8]) -> [u8; TAG_SIZE] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

/// Verifies a tag in constant time.
pub fn verify(key: &[u8], msg: &[u8], tag: &[u8]) -> bool {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(msg);
    mac.verify_slice(tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_verifies() {
        let tag = authenticate(b"invites-key", b"c@x|inv-1|2026-01-01");
        assert!(verify(b"invites-key", b"c@x|inv-1|2026-01-01", &tag));
    }

    #[test]
    fn wrong_key_rejected() {
        let tag = authenticate(b"invites-key", b"msg");
        assert!(!verify(b"other-key", b"msg", &tag));
    }

    #[test]
    fn tampered_message_rejected() {
        let tag = authenticate(b"invites-key", b"msg");
        assert!(!verify(b"invites-key", b"msh", &tag));
    }
}
