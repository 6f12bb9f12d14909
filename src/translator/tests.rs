use super::*;
use crate::crypto::cipher::AES_KEY_SIZE;
use crate::message::{EncryptionScheme, Priority};
use crate::utils::MessagingError;

fn echo() -> AnotherTestRequest {
    AnotherTestRequest {
        test_value: "Test Value".to_string(),
        test_data: b"Test Data".to_vec(),
    }
}

fn encrypted(key: u8) -> MessageTranslator {
    MessageTranslator::with_encryption(
        "test",
        "acme",
        "device-1",
        EncryptionScheme::AesCfb,
        vec![key; AES_KEY_SIZE],
    )
}

#[test]
fn test_plain_round_trip() {
    let translator = MessageTranslator::new("test", "acme", "device-1");
    let message = translator.to_message(&echo(), None).unwrap();

    assert_eq!(message.message_type, AnotherTestRequest::MESSAGE_TYPE);
    assert_eq!(message.type_version, 1);
    assert_eq!(message.priority, Priority::High.code());
    assert!(message.encryption_iv.is_empty());
    assert!(message.has_valid_data_hash());

    let decoded: AnotherTestRequest = translator.from_message(&message).unwrap();
    assert_eq!(decoded, echo());
}

#[test]
fn test_encrypted_round_trip_hashes_ciphertext() {
    let translator = encrypted(3);
    let correlation_id = uuid::Uuid::new_v4();
    let message = translator.to_message(&echo(), Some(correlation_id)).unwrap();

    assert_eq!(message.encryption_scheme, EncryptionScheme::AesCfb);
    assert!(!message.encryption_iv.is_empty());
    assert_eq!(message.correlation_id, Some(correlation_id));
    assert_eq!(message.data_hash, crate::crypto::data_hash(&message.data));

    let decoded: AnotherTestRequest = translator.from_message(&message).unwrap();
    assert_eq!(decoded, echo());
}

#[test]
fn test_wrong_key_is_a_decryption_error() {
    let message = encrypted(3).to_message(&echo(), None).unwrap();
    let err = encrypted(4)
        .from_message::<AnotherTestRequest>(&message)
        .unwrap_err();
    assert!(matches!(err, MessagingError::DecryptionError(_)));
}

#[test]
fn test_encrypted_message_without_key_is_a_decryption_error() {
    let message = encrypted(3).to_message(&echo(), None).unwrap();
    let err = MessageTranslator::new("test", "acme", "device-1")
        .from_message::<AnotherTestRequest>(&message)
        .unwrap_err();
    assert!(matches!(err, MessagingError::DecryptionError(_)));
}

#[test]
fn test_tampered_data_is_an_integrity_error() {
    let translator = MessageTranslator::new("test", "acme", "device-1");
    let mut message = translator.to_message(&echo(), None).unwrap();
    message.data.push(b' ');

    let err = translator
        .from_message::<AnotherTestRequest>(&message)
        .unwrap_err();
    assert!(matches!(err, MessagingError::IntegrityError { .. }));
}

#[test]
fn test_type_mismatch_is_unknown_type() {
    let translator = MessageTranslator::new("test", "acme", "device-1");
    let message = translator.to_message(&echo(), None).unwrap();

    let err = translator
        .from_message::<CheckUserExistsRequest>(&message)
        .unwrap_err();
    assert!(matches!(err, MessagingError::UnknownType { version: 1, .. }));
}

#[test]
fn test_missing_identity_is_rejected() {
    let err = MessageTranslator::new("test", "", "device-1")
        .to_message(&echo(), None)
        .unwrap_err();
    assert!(matches!(err, MessagingError::InvalidInput(_)));
}

#[test]
fn test_registry_dispatch() {
    let registry = PayloadRegistry::with_system_payloads();
    let translator = encrypted(9);
    let message = translator.to_message(&echo(), None).unwrap();

    match translator.decode_payload(&message, &registry).unwrap() {
        Payload::AnotherTestRequest(request) => assert_eq!(request, echo()),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn test_unregistered_type_is_unknown_type() {
    let registry = PayloadRegistry::new();
    let translator = MessageTranslator::new("test", "acme", "device-1");
    let message = translator.to_message(&echo(), None).unwrap();

    assert!(!registry.contains(&message.type_key()));
    let err = translator.decode_payload(&message, &registry).unwrap_err();
    assert!(matches!(err, MessagingError::UnknownType { .. }));
}

#[test]
fn test_registry_decodes_authenticate_request() {
    let registry = PayloadRegistry::with_system_payloads();
    let translator = MessageTranslator::new("test", "acme", "device-1");
    let request = AuthenticateRequest {
        user: "test".to_string(),
        organisation: "acme".to_string(),
        password: "password".to_string(),
        device: "device-1".to_string(),
        preferred_encryption_scheme: EncryptionScheme::AesCfb,
    };
    let message = translator.to_message(&request, None).unwrap();

    assert_eq!(message.message_type, "d21fb54e-5c5b-49e8-881f-ce00c6ced1a3");
    assert_eq!(AuthenticateRequest::MESSAGE_TYPE_PRIORITY, Priority::High);
    match translator.decode_payload(&message, &registry).unwrap() {
        Payload::AuthenticateRequest(decoded) => assert_eq!(decoded, request),
        other => panic!("unexpected payload {other:?}"),
    }
}
