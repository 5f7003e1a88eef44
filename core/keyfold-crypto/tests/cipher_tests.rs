//! Adversarial tests for AES-256-GCM sealing.
//!
//! Tests wrong-key decryption, ciphertext tampering, nonce corruption,
//! truncation, and AAD binding. These validate the guarantees the shared
//! container layer relies on for payload integrity.

use keyfold_crypto::{decrypt, encrypt, generate_random_key, CryptoError, NONCE_SIZE};

// ── Wrong Key ──

#[test]
fn decrypt_with_wrong_key_returns_error() {
    let key_a = generate_random_key();
    let key_b = generate_random_key();
    let plaintext = b"sensitive vault records that must not leak";

    let sealed = encrypt(&key_a, plaintext, b"vault-1").unwrap();
    let err = decrypt(&key_b, &sealed, b"vault-1").unwrap_err();

    assert!(matches!(err, CryptoError::Decryption(_)), "got: {err:?}");
}

// ── Ciphertext Tampering ──

#[test]
fn single_bit_flip_in_ciphertext_detected() {
    let key = generate_random_key();
    let sealed = encrypt(&key, b"integrity-protected data", b"c1").unwrap();

    let mut tampered = sealed.clone();
    if let Some(byte) = tampered.ciphertext.last_mut() {
        *byte ^= 0x01;
    }

    assert!(
        decrypt(&key, &tampered, b"c1").is_err(),
        "single bit flip must be detected by the GCM tag"
    );
}

#[test]
fn every_byte_position_tampering_detected() {
    let key = generate_random_key();
    let sealed = encrypt(&key, b"test data for position tampering", b"c1").unwrap();

    for i in 0..sealed.ciphertext.len() {
        let mut tampered = sealed.clone();
        tampered.ciphertext[i] ^= 0xFF;
        assert!(
            decrypt(&key, &tampered, b"c1").is_err(),
            "tampering at byte {i} should be detected"
        );
    }
}

#[test]
fn appended_bytes_detected() {
    let key = generate_random_key();
    let mut sealed = encrypt(&key, b"original data", b"c1").unwrap();
    sealed.ciphertext.push(0xFF);

    assert!(decrypt(&key, &sealed, b"c1").is_err());
}

// ── Nonce Tampering ──

#[test]
fn wrong_nonce_decryption_fails() {
    let key = generate_random_key();
    let mut sealed = encrypt(&key, b"nonce-critical data", b"c1").unwrap();
    sealed.nonce[0] ^= 0xFF;

    assert!(decrypt(&key, &sealed, b"c1").is_err());
}

#[test]
fn all_zero_nonce_decryption_fails() {
    let key = generate_random_key();
    let mut sealed = encrypt(&key, b"nonce should be random", b"c1").unwrap();
    sealed.nonce = [0u8; NONCE_SIZE];

    assert!(decrypt(&key, &sealed, b"c1").is_err());
}

// ── AAD Binding ──

#[test]
fn ciphertext_moved_between_containers_fails() {
    let key = generate_random_key();
    let sealed = encrypt(&key, b"payload of container one", b"container-1").unwrap();

    // Same key, different container id
    assert!(decrypt(&key, &sealed, b"container-2").is_err());
}

// ── Truncation ──

#[test]
fn truncated_ciphertext_fails() {
    let key = generate_random_key();
    let mut sealed = encrypt(&key, b"data that will be truncated", b"c1").unwrap();
    sealed.ciphertext.truncate(5);

    assert!(decrypt(&key, &sealed, b"c1").is_err());
}

#[test]
fn empty_ciphertext_fails() {
    let key = generate_random_key();
    let mut sealed = encrypt(&key, b"will be emptied", b"c1").unwrap();
    sealed.ciphertext.clear();

    assert!(decrypt(&key, &sealed, b"c1").is_err());
}

// ── Boundaries ──

#[test]
fn empty_plaintext_roundtrips() {
    let key = generate_random_key();
    let sealed = encrypt(&key, b"", b"c1").unwrap();
    assert_eq!(decrypt(&key, &sealed, b"c1").unwrap(), b"");
}

#[test]
fn large_plaintext_roundtrips() {
    let key = generate_random_key();
    let plaintext = vec![0x5Au8; 1 << 20];
    let sealed = encrypt(&key, &plaintext, b"c1").unwrap();
    assert_eq!(decrypt(&key, &sealed, b"c1").unwrap(), plaintext);
}

// Property-based tests
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn seal_open_always_roundtrips(
            plaintext in proptest::collection::vec(any::<u8>(), 0..512),
            aad in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let key = generate_random_key();
            let sealed = encrypt(&key, &plaintext, &aad).unwrap();
            let opened = decrypt(&key, &sealed, &aad).unwrap();
            prop_assert_eq!(opened, plaintext);
        }
    }
}
