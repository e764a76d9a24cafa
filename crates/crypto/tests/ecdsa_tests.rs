//! Tests for ECDSA keys and signatures

use l2core_crypto::{keccak256, PrivateKey, PublicKey};
use l2core_types::{AccountId, Signature, Transaction};

#[test]
fn test_private_key_generation() {
    let key1 = PrivateKey::random();
    let key2 = PrivateKey::random();
    assert_ne!(*key1.to_bytes(), *key2.to_bytes());
}

#[test]
fn test_private_key_from_bytes() {
    let key = PrivateKey::random();
    let restored = PrivateKey::from_bytes(&key.to_bytes()).unwrap();
    assert_eq!(*key.to_bytes(), *restored.to_bytes());
}

#[test]
fn test_private_key_from_hex() {
    let hex = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    let key = PrivateKey::from_hex(hex).unwrap();
    assert_eq!(key.to_hex().as_str(), &hex[2..]);
}

#[test]
fn test_zero_private_key_rejected() {
    assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
    assert!(PrivateKey::from_hex("0x1234").is_err());
}

#[test]
fn test_account_derivation_known_vector() {
    let hex = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    let key = PrivateKey::from_hex(hex).unwrap();
    assert_eq!(
        key.account_id().to_hex(),
        "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23"
    );
}

#[test]
fn test_public_key_hex_roundtrip() {
    let public = PrivateKey::random().public_key();
    let restored = PublicKey::from_hex(&public.to_hex_compressed()).unwrap();
    assert_eq!(restored, public);
    assert_eq!(restored.to_account(), public.to_account());
}

#[test]
fn test_recover_matches_signer() {
    let key = PrivateKey::random();
    let hash = keccak256(b"node heartbeat");
    let signature = key.sign_prehash(&hash).unwrap();
    let recovered = PublicKey::recover(&hash, &signature).unwrap();
    assert_eq!(recovered, key.public_key());
}

#[test]
fn test_verify_rejects_garbage_signature() {
    let public = PrivateKey::random().public_key();
    let garbage = Signature::from_bytes(&[0u8; 65]).unwrap();
    assert!(!public.verify_prehash(&keccak256(b"x"), &garbage));
}

#[test]
fn test_sign_transaction_binds_sender() {
    let key = PrivateKey::random();
    let tx = Transaction::transfer(key.account_id(), AccountId::new([2; 20]), 10, 1);
    let signed = key.sign_transaction(tx).unwrap();
    assert!(signed.verify());
    assert_eq!(signed.recover_signer().unwrap(), key.account_id());
}
