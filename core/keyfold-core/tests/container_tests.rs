//! Shared-container laws: round trip, confinement, fingerprint checks,
//! rotation, and tamper detection.

use keyfold_core::{Account, SharedContainer, Vault};
use keyfold_crypto::{generate_keypair, KdfParams};

fn account(email: &str) -> Account {
    Account::with_params(email, email, "pw1", KdfParams::fast_insecure()).unwrap()
}

#[test]
fn every_accessor_can_round_trip() {
    let a = account("a@x");
    let b = account("b@x");
    let mut container = SharedContainer::new("c1".to_string());

    container.update_accessors(&[&a, &b]).unwrap();
    container.set_data(b"the payload").unwrap();

    for acc in [&a, &b] {
        let mut copy = container.clone();
        copy.lock();
        copy.access(acc).unwrap();
        assert_eq!(copy.get_data().unwrap(), b"the payload");
    }
}

#[test]
fn non_accessor_fails_missing_access() {
    let a = account("a@x");
    let outsider = account("mallory@x");
    let mut container = SharedContainer::new("c1".to_string());

    container.update_accessors(&[&a]).unwrap();
    container.set_data(b"secret").unwrap();
    container.lock();

    let err = container.access(&outsider).unwrap_err();
    assert_eq!(err.code(), "MissingAccess");
}

#[test]
fn substituted_public_key_fails_key_mismatch() {
    let mut a = account("a@x");
    let mut container = SharedContainer::new("c1".to_string());

    container.update_accessors(&[&a]).unwrap();
    container.set_data(b"secret").unwrap();
    container.lock();

    // Key substitution between wrap and access
    let (other_public, _) = generate_keypair().unwrap();
    a.public_key = other_public;

    let err = container.access(&a).unwrap_err();
    assert_eq!(err.code(), "KeyMismatch");
}

#[test]
fn removed_accessor_loses_entry() {
    let a = account("a@x");
    let b = account("b@x");
    let mut container = SharedContainer::new("c1".to_string());

    container.update_accessors(&[&a, &b]).unwrap();
    container.set_data(b"secret").unwrap();
    container.update_accessors(&[&a]).unwrap();
    container.lock();

    let err = container.access(&b).unwrap_err();
    assert_eq!(err.code(), "MissingAccess");

    container.access(&a).unwrap();
    assert_eq!(container.get_data().unwrap(), b"secret");
}

#[test]
fn rotation_rewraps_for_remaining_accessors() {
    let a = account("a@x");
    let b = account("b@x");
    let mut container = SharedContainer::new("c1".to_string());

    container.update_accessors(&[&a, &b]).unwrap();
    container.set_data(b"v1").unwrap();

    let wrapped_before: Vec<_> = container
        .accessors()
        .iter()
        .map(|e| e.wrapped_key.clone())
        .collect();

    container.update_accessors(&[&a]).unwrap();
    container.rotate_key().unwrap();

    // New wraps differ from the old ones
    for entry in container.accessors() {
        assert!(!wrapped_before.contains(&entry.wrapped_key));
    }

    let mut copy = container.clone();
    copy.lock();
    copy.access(&a).unwrap();
    assert_eq!(copy.get_data().unwrap(), b"v1");
}

#[test]
fn accessor_table_always_matches_payload() {
    // After any update_accessors or rotate_key, every entry must unwrap to
    // a key that opens the current payload.
    let a = account("a@x");
    let b = account("b@x");
    let mut container = SharedContainer::new("c1".to_string());

    container.update_accessors(&[&a]).unwrap();
    container.set_data(b"state-0").unwrap();

    let steps: Vec<Box<dyn Fn(&mut SharedContainer) + '_>> = vec![
        Box::new(|c| c.update_accessors(&[&a, &b]).unwrap()),
        Box::new(|c| c.set_data(b"state-1").unwrap()),
        Box::new(|c| c.rotate_key().unwrap()),
        Box::new(|c| c.update_accessors(&[&b]).unwrap()),
        Box::new(|c| c.rotate_key().unwrap()),
    ];

    for step in steps {
        step(&mut container);
        for entry in container.accessors() {
            let mut copy = container.clone();
            copy.lock();
            let accessor = if entry.id == a.id { &a } else { &b };
            copy.access(accessor).unwrap();
            assert!(copy.get_data().is_ok(), "entry {} stale", entry.id);
        }
    }
}

#[test]
fn duplicate_accessors_rejected() {
    let a = account("a@x");
    let mut container = SharedContainer::new("c1".to_string());
    assert!(container.update_accessors(&[&a, &a]).is_err());
}

#[test]
fn locked_container_refuses_writes() {
    let a = account("a@x");
    let mut container = SharedContainer::new("c1".to_string());
    container.update_accessors(&[&a]).unwrap();
    container.set_data(b"secret").unwrap();
    container.lock();

    assert!(container.get_data().is_err());
    assert!(container.set_data(b"overwrite").is_err());
    assert!(container.rotate_key().is_err());
}

#[test]
fn tampered_vault_payload_fails_decryption() {
    let a = account("a@x");
    let mut vault = Vault::new("Personal", None);

    vault.update_accessors(&[&a]).unwrap();
    vault.set_records(b"serialized records").unwrap();

    // Flip one byte of the ciphertext through the serialized form
    let mut json = serde_json::to_value(&vault).unwrap();
    let b64 = json["container"]["payload"]["ciphertext"]
        .as_str()
        .unwrap()
        .to_string();
    let mut raw = keyfold_crypto::b64::decode(&b64).unwrap();
    raw[0] ^= 0x01;
    json["container"]["payload"]["ciphertext"] =
        serde_json::Value::String(keyfold_crypto::b64::encode(&raw));

    let mut tampered: Vault = serde_json::from_value(json).unwrap();
    tampered.access(&a).unwrap();
    let err = tampered.records().unwrap_err();
    assert_eq!(err.code(), "DecryptionFailed");
}
