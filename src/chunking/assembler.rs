use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};
use uuid::Uuid;

use super::engine::reassemble;
use crate::message::{Message, MessagePart};
use crate::utils::Result;

/// Collects parts across download polls until a message's set is complete.
///
/// Parts are keyed by `part_no`, so a re-delivered part (the server resends
/// anything that was not acknowledged) replaces nothing and is simply
/// dropped.
#[derive(Debug, Default)]
pub struct PartAssembler {
    pending: HashMap<Uuid, BTreeMap<u32, MessagePart>>,
}

impl PartAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `part` and, once `total_parts` distinct parts of its message are
    /// held, returns the reassembly outcome. The message is forgotten after
    /// that whether reassembly succeeded or not.
    pub fn add(&mut self, part: MessagePart) -> Option<Result<Message>> {
        let message_id = part.message_id;
        let total_parts = part.total_parts as usize;
        let part_no = part.part_no;

        let parts = self.pending.entry(message_id).or_default();
        if parts.contains_key(&part_no) {
            debug!("Ignoring the re-delivered part {part_no} of the message ({message_id})");
            return None;
        }
        parts.insert(part_no, part);

        if parts.len() < total_parts {
            return None;
        }

        let parts: Vec<MessagePart> = self
            .pending
            .remove(&message_id)
            .map(|parts| parts.into_values().collect())
            .unwrap_or_default();

        let result = reassemble(&parts);
        if let Err(e) = &result {
            warn!("Failed to reassemble the message ({message_id}): {e}");
        }
        Some(result)
    }

    /// The number of messages that still have parts outstanding.
    pub fn pending_messages(&self) -> usize {
        self.pending.len()
    }

    pub fn received_parts(&self, message_id: &Uuid) -> usize {
        self.pending.get(message_id).map_or(0, BTreeMap::len)
    }
}
