//! SRP-6a handshake over the RFC 5054 2048-bit group.
//!
//! The server stores only the verifier `v = g^x mod N`; `x` is derived
//! client-side from the password via the account's KDF parameters. Both
//! sides arrive at the same session key `K = H(S)` without the password
//! ever crossing the wire.
//!
//! All group elements are left-padded to the modulus length before hashing,
//! so proofs are independent of leading-zero stripping.

use crate::error::{Error, Result};
use keyfold_crypto::DerivedKey;
use num_bigint_dig::BigUint;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

// RFC 5054 Appendix A, 2048-bit group.
const N_2048_HEX: &[u8] = b"\
AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050\
A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50\
E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B8\
55F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773B\
CA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748\
544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6\
AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB6\
94B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73";

const GENERATOR: u32 = 2;

/// Ephemeral secret size in bytes.
const EPHEMERAL_SIZE: usize = 32;

/// The SRP group parameters (prime modulus and generator).
#[derive(Clone, Debug)]
pub struct SrpGroup {
    n: BigUint,
    g: BigUint,
}

impl SrpGroup {
    pub fn rfc5054_2048() -> Self {
        let n = BigUint::parse_bytes(N_2048_HEX, 16).expect("group modulus is a valid hex literal");
        Self {
            n,
            g: BigUint::from(GENERATOR),
        }
    }

    /// Modulus length in bytes; all transmitted elements pad to this.
    pub fn byte_len(&self) -> usize {
        (self.n.bits() + 7) / 8
    }

    fn pad(&self, value: &BigUint) -> Vec<u8> {
        let bytes = value.to_bytes_be();
        let len = self.byte_len();
        let mut out = vec![0u8; len.saturating_sub(bytes.len())];
        out.extend_from_slice(&bytes);
        out
    }

    /// Multiplier parameter `k = H(N || pad(g))`.
    fn multiplier(&self) -> BigUint {
        let mut hasher = Sha256::new();
        hasher.update(self.pad(&self.n));
        hasher.update(self.pad(&self.g));
        BigUint::from_bytes_be(&hasher.finalize())
    }

    /// Scrambling parameter `u = H(pad(A) || pad(B))`.
    fn scrambler(&self, a_pub: &BigUint, b_pub: &BigUint) -> BigUint {
        let mut hasher = Sha256::new();
        hasher.update(self.pad(a_pub));
        hasher.update(self.pad(b_pub));
        BigUint::from_bytes_be(&hasher.finalize())
    }

    /// Computes the verifier `v = g^x mod N`, padded to modulus length.
    pub fn verifier(&self, x: &BigUint) -> Vec<u8> {
        self.pad(&self.g.modpow(x, &self.n))
    }
}

impl Default for SrpGroup {
    fn default() -> Self {
        Self::rfc5054_2048()
    }
}

/// The client's private value `x`, taken from the KDF output.
pub fn private_exponent(key: &DerivedKey) -> BigUint {
    BigUint::from_bytes_be(key.as_bytes())
}

/// Session key plus the two proofs exchanged after the key agreement.
pub struct HandshakeOutcome {
    pub session_key: DerivedKey,
    /// Client proof `M1 = H(pad(A) || pad(B) || K)`.
    pub client_proof: Vec<u8>,
    /// Server proof `M2 = H(pad(A) || M1 || K)`.
    pub server_proof: Vec<u8>,
}

fn outcome(group: &SrpGroup, a_pub: &BigUint, b_pub: &BigUint, secret: &BigUint) -> HandshakeOutcome {
    let session = Sha256::digest(group.pad(secret));

    let mut m1 = Sha256::new();
    m1.update(group.pad(a_pub));
    m1.update(group.pad(b_pub));
    m1.update(session);
    let client_proof = m1.finalize().to_vec();

    let mut m2 = Sha256::new();
    m2.update(group.pad(a_pub));
    m2.update(&client_proof);
    m2.update(session);
    let server_proof = m2.finalize().to_vec();

    HandshakeOutcome {
        session_key: DerivedKey::from_bytes(session.into()),
        client_proof,
        server_proof,
    }
}

/// Constant-time proof comparison.
pub fn proofs_match(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len() && left.ct_eq(right).into()
}

/// Client half of the handshake: ephemeral `a`, public `A = g^a`.
pub struct ClientHandshake {
    group: SrpGroup,
    a: BigUint,
    a_pub: BigUint,
}

impl ClientHandshake {
    pub fn new() -> Self {
        let group = SrpGroup::default();
        let a = random_ephemeral(&group);
        let a_pub = group.g.modpow(&a, &group.n);
        Self { group, a, a_pub }
    }

    pub fn public_a(&self) -> Vec<u8> {
        self.group.pad(&self.a_pub)
    }

    /// Completes the exchange against the server value `B`, producing the
    /// session key and proofs. Rejects `B ≡ 0 (mod N)`.
    pub fn finish(&self, x: &BigUint, b_pub: &[u8]) -> Result<HandshakeOutcome> {
        let n = &self.group.n;
        let zero = BigUint::from(0u32);
        let b_pub = BigUint::from_bytes_be(b_pub);
        if &b_pub % n == zero {
            return Err(Error::AuthenticationFailed);
        }

        let u = self.group.scrambler(&self.a_pub, &b_pub);
        if u == zero {
            return Err(Error::AuthenticationFailed);
        }

        // S = (B - k * g^x) ^ (a + u * x) mod N
        let k = self.group.multiplier();
        let gx = self.group.g.modpow(x, n);
        let kgx = (&k * &gx) % n;
        let base = ((&b_pub % n) + n - kgx) % n;
        let exponent = &self.a + &u * x;
        let secret = base.modpow(&exponent, n);

        Ok(outcome(&self.group, &self.a_pub, &b_pub, &secret))
    }
}

impl Default for ClientHandshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Server half of the handshake: ephemeral `b`, public `B = k*v + g^b`.
pub struct ServerHandshake {
    group: SrpGroup,
    b: BigUint,
    b_pub: BigUint,
    v: BigUint,
}

impl ServerHandshake {
    pub fn new(verifier: &[u8]) -> Self {
        let group = SrpGroup::default();
        let v = BigUint::from_bytes_be(verifier);
        let b = random_ephemeral(&group);
        let k = group.multiplier();
        let b_pub = (&k * &v + group.g.modpow(&b, &group.n)) % &group.n;
        Self { group, b, b_pub, v }
    }

    pub fn public_b(&self) -> Vec<u8> {
        self.group.pad(&self.b_pub)
    }

    /// Reconstructs the shared secret from the client value `A`.
    /// Rejects `A ≡ 0 (mod N)`, which would force the secret to zero.
    pub fn complete(&self, a_pub: &[u8]) -> Result<HandshakeOutcome> {
        let n = &self.group.n;
        let zero = BigUint::from(0u32);
        let a_pub = BigUint::from_bytes_be(a_pub);
        if &a_pub % n == zero {
            return Err(Error::AuthenticationFailed);
        }

        let u = self.group.scrambler(&a_pub, &self.b_pub);

        // S = (A * v^u) ^ b mod N
        let base = (&a_pub * self.v.modpow(&u, n)) % n;
        let secret = base.modpow(&self.b, n);

        Ok(outcome(&self.group, &a_pub, &self.b_pub, &secret))
    }
}

fn random_ephemeral(group: &SrpGroup) -> BigUint {
    let zero = BigUint::from(0u32);
    loop {
        let candidate =
            BigUint::from_bytes_be(&keyfold_crypto::random_bytes(EPHEMERAL_SIZE)) % &group.n;
        if candidate != zero {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyfold_crypto::{derive_key, KdfParams};

    fn exponent_for(password: &str, params: &KdfParams) -> BigUint {
        private_exponent(&derive_key(password, params).unwrap())
    }

    #[test]
    fn handshake_agrees_on_session_key() {
        let params = KdfParams::fast_insecure();
        let x = exponent_for("pw1", &params);
        let verifier = SrpGroup::default().verifier(&x);

        let server = ServerHandshake::new(&verifier);
        let client = ClientHandshake::new();

        let client_out = client.finish(&x, &server.public_b()).unwrap();
        let server_out = server.complete(&client.public_a()).unwrap();

        assert_eq!(
            client_out.session_key.as_bytes(),
            server_out.session_key.as_bytes()
        );
        assert!(proofs_match(
            &client_out.client_proof,
            &server_out.client_proof
        ));
        assert!(proofs_match(
            &client_out.server_proof,
            &server_out.server_proof
        ));
    }

    #[test]
    fn wrong_password_yields_mismatched_proofs() {
        let params = KdfParams::fast_insecure();
        let x_real = exponent_for("pw1", &params);
        let x_wrong = exponent_for("pw2", &params);
        let verifier = SrpGroup::default().verifier(&x_real);

        let server = ServerHandshake::new(&verifier);
        let client = ClientHandshake::new();

        let client_out = client.finish(&x_wrong, &server.public_b()).unwrap();
        let server_out = server.complete(&client.public_a()).unwrap();

        assert!(!proofs_match(
            &client_out.client_proof,
            &server_out.client_proof
        ));
    }

    #[test]
    fn server_rejects_zero_a() {
        let params = KdfParams::fast_insecure();
        let x = exponent_for("pw1", &params);
        let verifier = SrpGroup::default().verifier(&x);
        let server = ServerHandshake::new(&verifier);

        let group = SrpGroup::default();
        let zero = group.pad(&BigUint::from(0u32));
        assert!(server.complete(&zero).is_err());

        // A = N is congruent to zero as well
        let n_bytes = group.verifier(&BigUint::from(1u32)); // g^1, just for length
        assert_eq!(n_bytes.len(), group.byte_len());
        assert!(server.complete(&group.pad(&group.n)).is_err());
    }

    #[test]
    fn client_rejects_zero_b() {
        let params = KdfParams::fast_insecure();
        let x = exponent_for("pw1", &params);
        let client = ClientHandshake::new();
        let group = SrpGroup::default();
        assert!(client.finish(&x, &group.pad(&BigUint::from(0u32))).is_err());
    }

    #[test]
    fn verifier_is_padded_to_group_length() {
        let group = SrpGroup::default();
        let v = group.verifier(&BigUint::from(1u32));
        assert_eq!(v.len(), group.byte_len());
    }
}
