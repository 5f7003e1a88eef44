use keyfold_crypto::{
    generate_keypair, generate_random_key, open_key, seal_key, CryptoError, PrivateKey, PublicKey,
    WrappedKey,
};

#[test]
fn keypair_der_roundtrip() {
    let (public, private) = generate_keypair().unwrap();

    let pub_der = public.to_der().unwrap();
    let restored_pub = PublicKey::from_der(&pub_der).unwrap();
    assert_eq!(public, restored_pub);

    let priv_der = private.to_der().unwrap();
    let restored_priv = PrivateKey::from_der(&priv_der).unwrap();
    assert_eq!(restored_priv.public_key(), public);
}

#[test]
fn fingerprint_is_stable() {
    let (public, _) = generate_keypair().unwrap();
    let fp1 = public.fingerprint().unwrap();
    let fp2 = PublicKey::from_der(&public.to_der().unwrap())
        .unwrap()
        .fingerprint()
        .unwrap();
    assert_eq!(fp1, fp2);
}

#[test]
fn distinct_keypairs_have_distinct_fingerprints() {
    let (a, _) = generate_keypair().unwrap();
    let (b, _) = generate_keypair().unwrap();
    assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
}

#[test]
fn seal_open_key_roundtrip() {
    let (public, private) = generate_keypair().unwrap();
    let data_key = generate_random_key();

    let wrapped = seal_key(&public, &data_key).unwrap();
    let recovered = open_key(&private, &wrapped).unwrap();

    assert_eq!(recovered.as_bytes(), data_key.as_bytes());
}

#[test]
fn wrong_private_key_fails_to_open() {
    let (public, _) = generate_keypair().unwrap();
    let (_, wrong_private) = generate_keypair().unwrap();
    let data_key = generate_random_key();

    let wrapped = seal_key(&public, &data_key).unwrap();
    let err = open_key(&wrong_private, &wrapped).unwrap_err();

    // Unwrap failure is the distinguished variant, not a generic decryption error
    assert!(matches!(err, CryptoError::Unwrap(_)), "got: {err:?}");
}

#[test]
fn tampered_blob_fails_to_open() {
    let (public, private) = generate_keypair().unwrap();
    let data_key = generate_random_key();

    let mut wrapped = seal_key(&public, &data_key).unwrap();
    if let Some(byte) = wrapped.0.first_mut() {
        *byte ^= 0xFF;
    }

    assert!(open_key(&private, &wrapped).is_err());
}

#[test]
fn each_seal_produces_different_blob() {
    let (public, private) = generate_keypair().unwrap();
    let data_key = generate_random_key();

    let w1 = seal_key(&public, &data_key).unwrap();
    let w2 = seal_key(&public, &data_key).unwrap();

    // OAEP is randomized
    assert_ne!(w1.0, w2.0);
    assert_eq!(
        open_key(&private, &w1).unwrap().as_bytes(),
        open_key(&private, &w2).unwrap().as_bytes()
    );
}

#[test]
fn public_key_serialization_roundtrip() {
    let (public, _) = generate_keypair().unwrap();

    let json = serde_json::to_string(&public).unwrap();
    let deserialized: PublicKey = serde_json::from_str(&json).unwrap();

    assert_eq!(public, deserialized);
    assert_eq!(
        public.fingerprint().unwrap(),
        deserialized.fingerprint().unwrap()
    );
}

#[test]
fn wrapped_key_serialization_roundtrip() {
    let (public, private) = generate_keypair().unwrap();
    let data_key = generate_random_key();

    let wrapped = seal_key(&public, &data_key).unwrap();
    let json = serde_json::to_string(&wrapped).unwrap();
    let deserialized: WrappedKey = serde_json::from_str(&json).unwrap();

    assert_eq!(wrapped, deserialized);
    let recovered = open_key(&private, &deserialized).unwrap();
    assert_eq!(recovered.as_bytes(), data_key.as_bytes());
}
