use super::cipher::{AES_KEY_SIZE, decrypt, encrypt};
use super::{KeyDeriver, data_hash};
use crate::config::DEFAULT_MASTER_KEY;
use crate::message::EncryptionScheme;
use crate::utils::MessagingError;

fn key(byte: u8) -> Vec<u8> {
    vec![byte; AES_KEY_SIZE]
}

#[test]
fn test_data_hash_is_base64_sha1() {
    // SHA-1("abc") = a9993e364706816aba3e25717850c26c9cd0d89d
    assert_eq!(data_hash(b"abc"), "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=");
}

#[test]
fn test_aes_cfb_round_trip() {
    let sealed = encrypt(EncryptionScheme::AesCfb, &key(7), b"attack at dawn").unwrap();
    assert_ne!(&sealed.data[..14], b"attack at dawn");
    assert!(!sealed.iv.is_empty());

    let plain = decrypt(EncryptionScheme::AesCfb, &key(7), &sealed.iv, &sealed.data).unwrap();
    assert_eq!(plain, b"attack at dawn");
}

#[test]
fn test_every_encryption_uses_a_fresh_iv() {
    let a = encrypt(EncryptionScheme::AesCfb, &key(1), b"same").unwrap();
    let b = encrypt(EncryptionScheme::AesCfb, &key(1), b"same").unwrap();
    assert_ne!(a.iv, b.iv);
    assert_ne!(a.data, b.data);
}

#[test]
fn test_wrong_key_is_a_decryption_error() {
    let sealed = encrypt(EncryptionScheme::AesCfb, &key(1), b"secret payload").unwrap();
    let err = decrypt(EncryptionScheme::AesCfb, &key(2), &sealed.iv, &sealed.data).unwrap_err();
    assert!(matches!(err, MessagingError::DecryptionError(_)));
}

#[test]
fn test_wrong_iv_is_a_decryption_error() {
    let sealed = encrypt(EncryptionScheme::AesCfb, &key(1), b"secret payload").unwrap();
    let other = encrypt(EncryptionScheme::AesCfb, &key(1), b"other").unwrap();
    let err = decrypt(EncryptionScheme::AesCfb, &key(1), &other.iv, &sealed.data).unwrap_err();
    assert!(matches!(err, MessagingError::DecryptionError(_)));
}

#[test]
fn test_missing_key_is_a_decryption_error() {
    let sealed = encrypt(EncryptionScheme::AesCfb, &key(1), b"x").unwrap();
    let err = decrypt(EncryptionScheme::AesCfb, &[], &sealed.iv, &sealed.data).unwrap_err();
    assert!(matches!(err, MessagingError::DecryptionError(_)));
}

#[test]
fn test_short_key_is_rejected_on_encrypt() {
    let err = encrypt(EncryptionScheme::AesCfb, &[0u8; 5], b"x").unwrap_err();
    assert!(matches!(err, MessagingError::InvalidInput(_)));
}

#[test]
fn test_scheme_none_is_passthrough() {
    let sealed = encrypt(EncryptionScheme::None, &[], b"plain").unwrap();
    assert_eq!(sealed.data, b"plain");
    assert!(sealed.iv.is_empty());
    assert_eq!(decrypt(EncryptionScheme::None, &[], "", b"plain").unwrap(), b"plain");
}

#[test]
fn test_derived_keys_are_stable_and_distinct() {
    let deriver = KeyDeriver::from_base64(DEFAULT_MASTER_KEY).unwrap();

    let a = deriver
        .derive(EncryptionScheme::AesCfb, "Test", "ACME", "Device-1")
        .unwrap();
    let b = deriver
        .derive(EncryptionScheme::AesCfb, "test", "acme", "device-1")
        .unwrap();
    let c = deriver
        .derive(EncryptionScheme::AesCfb, "test", "acme", "device-2")
        .unwrap();

    assert_eq!(a.len(), AES_KEY_SIZE);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(
        deriver
            .derive(EncryptionScheme::None, "test", "acme", "device-1")
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_master_key_must_be_32_bytes() {
    assert!(KeyDeriver::new(vec![0u8; 16]).is_err());
    assert!(KeyDeriver::from_base64("not base64!").is_err());
}
