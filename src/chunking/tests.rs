use super::{PartAssembler, needs_split, reassemble, split};
use crate::crypto;
use crate::message::{Message, MessagePart};
use crate::utils::MessagingError;

fn message_with(data: Vec<u8>) -> Message {
    Message::new(
        "test",
        "acme",
        "device-1",
        "e9918051-8ebc-48f1-bad7-13c59b550e1a",
        1,
        None,
        5,
        data,
    )
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_split_ten_bytes_into_parts_of_four() {
    let msg = message_with(patterned(10));
    let parts = split(&msg, 4).unwrap();

    let lengths: Vec<usize> = parts.iter().map(|p| p.data.len()).collect();
    assert_eq!(lengths, vec![4, 4, 2]);
    assert!(parts.iter().all(|p| p.total_parts == 3));
    assert_eq!(
        parts.iter().map(|p| p.part_no).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn test_split_part_counts_and_lengths() {
    for max in [1usize, 3, 4, 7, 16] {
        for len in 0..40usize {
            let msg = message_with(patterned(len));
            let parts = split(&msg, max).unwrap();

            assert_eq!(parts.len(), len.div_ceil(max), "len={len} max={max}");
            assert_eq!(parts.iter().map(|p| p.data.len()).sum::<usize>(), len);
            for part in parts.iter().take(parts.len().saturating_sub(1)) {
                assert_eq!(part.data.len(), max);
            }
        }
    }
}

#[test]
fn test_split_stamps_checksum_of_full_payload() {
    let msg = message_with(patterned(100));
    let parts = split(&msg, 30).unwrap();
    let expected = crypto::data_hash(&msg.data);

    assert!(parts.iter().all(|p| p.message_checksum == expected));
    assert!(parts.iter().all(|p| p.message_id == msg.id));
}

#[test]
fn test_split_rejects_zero_part_size() {
    let msg = message_with(patterned(10));
    let err = split(&msg, 0).unwrap_err();
    assert!(matches!(err, MessagingError::InvalidInput(_)));
}

#[test]
fn test_split_then_reassemble_restores_message() {
    let msg = message_with(patterned(1000));
    let mut parts = split(&msg, 64).unwrap();
    parts.reverse();

    let rebuilt = reassemble(&parts).unwrap();
    assert_eq!(rebuilt.id, msg.id);
    assert_eq!(rebuilt.data, msg.data);
    assert_eq!(rebuilt.data_hash, msg.data_hash);
    assert_eq!(rebuilt.message_type, msg.message_type);
    assert_eq!(rebuilt.device, msg.device);
    assert_eq!(crypto::data_hash(&rebuilt.data), parts[0].message_checksum);
}

#[test]
fn test_reassemble_rejects_duplicate_part() {
    let msg = message_with(patterned(10));
    let mut parts = split(&msg, 4).unwrap();
    parts.push(parts[1].clone());

    let err = reassemble(&parts).unwrap_err();
    assert!(matches!(err, MessagingError::DuplicatePart { part_no: 2, .. }));
}

#[test]
fn test_reassemble_rejects_incomplete_set() {
    let msg = message_with(patterned(10));
    let mut parts = split(&msg, 4).unwrap();
    parts.remove(1);

    let err = reassemble(&parts).unwrap_err();
    assert!(matches!(
        err,
        MessagingError::IncompleteSet {
            found: 2,
            expected: 3,
            ..
        }
    ));
}

#[test]
fn test_reassemble_rejects_empty_input() {
    let err = reassemble(&[]).unwrap_err();
    assert!(matches!(err, MessagingError::IncompleteSet { .. }));
}

#[test]
fn test_reassemble_detects_corrupted_part() {
    let msg = message_with(patterned(10));
    let mut parts = split(&msg, 4).unwrap();
    parts[2].data[0] ^= 0xff;

    let err = reassemble(&parts).unwrap_err();
    assert!(matches!(err, MessagingError::ChecksumMismatch { .. }));
}

#[test]
fn test_reassemble_rejects_parts_from_another_message() {
    let a = split(&message_with(patterned(10)), 4).unwrap();
    let b = split(&message_with(patterned(10)), 4).unwrap();
    let mixed: Vec<MessagePart> = vec![a[0].clone(), b[1].clone(), a[2].clone()];

    let err = reassemble(&mixed).unwrap_err();
    assert!(matches!(err, MessagingError::InvalidInput(_)));
}

#[test]
fn test_needs_split_threshold_is_exclusive() {
    assert!(!needs_split(&message_with(patterned(16)), 16));
    assert!(needs_split(&message_with(patterned(17)), 16));
}

#[test]
fn test_assembler_waits_for_full_set_and_ignores_redelivery() {
    let msg = message_with(patterned(10));
    let parts = split(&msg, 4).unwrap();
    let mut assembler = PartAssembler::new();

    assert!(assembler.add(parts[2].clone()).is_none());
    assert!(assembler.add(parts[2].clone()).is_none());
    assert_eq!(assembler.received_parts(&msg.id), 1);
    assert!(assembler.add(parts[0].clone()).is_none());
    assert_eq!(assembler.pending_messages(), 1);

    let rebuilt = assembler.add(parts[1].clone()).unwrap().unwrap();
    assert_eq!(rebuilt.data, msg.data);
    assert_eq!(assembler.pending_messages(), 0);
}

#[test]
fn test_assembler_keeps_messages_apart() {
    let a = message_with(patterned(8));
    let b = message_with(patterned(9));
    let pa = split(&a, 4).unwrap();
    let pb = split(&b, 4).unwrap();
    let mut assembler = PartAssembler::new();

    assert!(assembler.add(pa[0].clone()).is_none());
    assert!(assembler.add(pb[0].clone()).is_none());
    assert!(assembler.add(pb[2].clone()).is_none());
    assert_eq!(assembler.pending_messages(), 2);

    let rebuilt_a = assembler.add(pa[1].clone()).unwrap().unwrap();
    assert_eq!(rebuilt_a.id, a.id);
    let rebuilt_b = assembler.add(pb[1].clone()).unwrap().unwrap();
    assert_eq!(rebuilt_b.data, b.data);
}
