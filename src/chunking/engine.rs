use std::collections::BTreeMap;

use tracing::debug;
use uuid::Uuid;

use crate::crypto;
use crate::message::{Message, MessagePart, MessageStatus};
use crate::utils::{MessagingError, Result};

/// Whether `message` must be split before it can be sent.
pub fn needs_split(message: &Message, max_async_message_size: usize) -> bool {
    message.data.len() > max_async_message_size
}

/// Splits `message` into `ceil(len / max_part_size)` parts.
///
/// The checksum stamped on every part is computed once, over the complete
/// payload, before any slicing happens.
pub fn split(message: &Message, max_part_size: usize) -> Result<Vec<MessagePart>> {
    if max_part_size == 0 {
        return Err(MessagingError::InvalidInput(format!(
            "Failed to split the message ({}): the maximum part size must be greater than zero",
            message.id
        )));
    }

    let checksum = crypto::data_hash(&message.data);
    let total_parts = u32::try_from(message.data.len().div_ceil(max_part_size)).map_err(|_| {
        MessagingError::InvalidInput(format!(
            "Failed to split the message ({}): too many parts",
            message.id
        ))
    })?;

    let parts: Vec<MessagePart> = message
        .data
        .chunks(max_part_size)
        .zip(1..)
        .map(|(chunk, part_no)| {
            MessagePart::new(part_no, total_parts, message, &checksum, chunk.to_vec())
        })
        .collect();

    debug!(
        "Split the message ({}) of {} bytes into {} parts",
        message.id,
        message.data.len(),
        total_parts
    );

    Ok(parts)
}

/// Reassembles a message from a complete set of its parts.
///
/// Arrival order does not matter; the data is concatenated by ascending
/// `part_no`. The set must contain every part number in `[1, total_parts]`
/// exactly once, and the digest of the result must equal the parts'
/// `message_checksum`.
pub fn reassemble(parts: &[MessagePart]) -> Result<Message> {
    let Some(first) = parts.first() else {
        return Err(MessagingError::IncompleteSet {
            message_id: Uuid::nil(),
            found: 0,
            expected: 0,
        });
    };

    let message_id = first.message_id;
    let total_parts = first.total_parts;

    if total_parts == 0 {
        return Err(MessagingError::InvalidInput(format!(
            "The message part ({}) for the message ({message_id}) declares zero total parts",
            first.id
        )));
    }

    let mut ordered: BTreeMap<u32, &MessagePart> = BTreeMap::new();

    for part in parts {
        if part.message_id != message_id
            || part.total_parts != total_parts
            || part.message_checksum != first.message_checksum
        {
            return Err(MessagingError::InvalidInput(format!(
                "The message part ({}) does not belong to the same part set as the message ({message_id})",
                part.id
            )));
        }

        if part.part_no == 0 || part.part_no > total_parts {
            return Err(MessagingError::InvalidInput(format!(
                "The message part ({}) has part number {} outside [1, {total_parts}]",
                part.id, part.part_no
            )));
        }

        if ordered.insert(part.part_no, part).is_some() {
            return Err(MessagingError::DuplicatePart {
                message_id,
                part_no: part.part_no,
            });
        }
    }

    if ordered.len() != total_parts as usize {
        return Err(MessagingError::IncompleteSet {
            message_id,
            found: ordered.len(),
            expected: total_parts,
        });
    }

    let data: Vec<u8> = ordered
        .values()
        .flat_map(|part| part.data.iter().copied())
        .collect();

    let checksum = crypto::data_hash(&data);
    if checksum != first.message_checksum {
        return Err(MessagingError::ChecksumMismatch {
            message_id,
            expected: first.message_checksum.clone(),
            actual: checksum,
        });
    }

    debug!(
        "Reassembled the message ({message_id}) of {} bytes from {total_parts} parts",
        data.len()
    );

    Ok(Message {
        id: message_id,
        user: first.message_user.clone(),
        organisation: first.message_organisation.clone(),
        device: first.message_device.clone(),
        message_type: first.message_type.clone(),
        type_version: first.message_type_version,
        correlation_id: first.message_correlation_id,
        priority: first.message_priority,
        created: first.message_created,
        data,
        data_hash: first.message_data_hash.clone(),
        encryption_scheme: first.message_encryption_scheme,
        encryption_iv: first.message_encryption_iv.clone(),
        status: MessageStatus::Initialised,
        process_attempts: 0,
        download_attempts: 0,
        lock_name: None,
        last_processed: None,
        updated: None,
        encryption_disabled: false,
    })
}
