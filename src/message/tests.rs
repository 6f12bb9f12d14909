use super::{EncryptionScheme, Message, MessagePart, MessageStatus, Priority};
use crate::crypto;

fn sample_message(data: &[u8]) -> Message {
    Message::new(
        "test",
        "acme",
        "device-1",
        "e9918051-8ebc-48f1-bad7-13c59b550e1a",
        1,
        None,
        Priority::High.code(),
        data.to_vec(),
    )
}

#[test]
fn test_new_message_defaults() {
    let msg = sample_message(b"hello");
    assert_eq!(msg.status, MessageStatus::Initialised);
    assert_eq!(msg.encryption_scheme, EncryptionScheme::None);
    assert!(msg.encryption_iv.is_empty());
    assert!(!msg.is_encrypted());
    assert_eq!(msg.priority, 10);
    assert_eq!(msg.process_attempts, 0);
}

#[test]
fn test_data_hash_tracks_data() {
    let mut msg = sample_message(b"hello");
    assert_eq!(msg.data_hash, crypto::data_hash(b"hello"));
    assert!(msg.has_valid_data_hash());

    msg.data[0] = b'j';
    assert!(!msg.has_valid_data_hash());
}

#[test]
fn test_message_ids_are_unique() {
    let a = sample_message(b"x");
    let b = sample_message(b"x");
    assert_ne!(a.id, b.id);
}

#[test]
fn test_part_copies_message_metadata() {
    let msg = sample_message(b"0123456789");
    let part = MessagePart::new(2, 3, &msg, "checksum", b"4567".to_vec());

    assert_eq!(part.message_id, msg.id);
    assert_eq!(part.message_user, msg.user);
    assert_eq!(part.message_device, msg.device);
    assert_eq!(part.message_type, msg.message_type);
    assert_eq!(part.message_data_hash, msg.data_hash);
    assert_eq!(part.message_checksum, "checksum");
    assert_eq!(part.message_type_key(), msg.type_key());
    assert_ne!(part.id, msg.id);
}

#[test]
fn test_stored_message_without_bookkeeping_fields_deserializes() {
    let msg = sample_message(b"payload");
    let mut value = serde_json::to_value(&msg).unwrap();
    let obj = value.as_object_mut().unwrap();
    obj.remove("process_attempts");
    obj.remove("lock_name");
    obj.remove("encryption_disabled");

    let parsed: Message = serde_json::from_value(value).unwrap();
    assert_eq!(parsed.process_attempts, 0);
    assert_eq!(parsed.lock_name, None);
    assert!(!parsed.encryption_disabled);
}
