use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::message::{EncryptionScheme, Message, MessageTypeKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MessagePartStatus {
    #[default]
    Initialised,
    QueuedForSending,
    Sending,
    QueuedForAssembly,
    Assembling,
    QueuedForDownload,
    Downloading,
    Aborted,
    Failed,
}

/// One ordered fragment of an oversized message's `data`.
///
/// Parts are transmitted and acknowledged independently, so every part
/// carries a copy of the owning message's routing and crypto metadata.
/// `message_checksum` is the digest of the complete, unsplit payload and is
/// identical across all parts of one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    pub id: Uuid,
    pub part_no: u32,
    pub total_parts: u32,
    pub message_id: Uuid,
    pub message_user: String,
    pub message_organisation: String,
    pub message_device: String,
    pub message_type: String,
    pub message_type_version: u32,
    pub message_correlation_id: Option<Uuid>,
    pub message_priority: i32,
    pub message_created: DateTime<Utc>,
    pub message_data_hash: String,
    pub message_encryption_scheme: EncryptionScheme,
    pub message_encryption_iv: String,
    pub message_checksum: String,
    pub data: Vec<u8>,
    pub status: MessagePartStatus,

    #[serde(default)]
    pub download_attempts: u32,
    #[serde(default)]
    pub lock_name: Option<String>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl MessagePart {
    /// Builds part `part_no` of `total_parts` for `message`, copying its
    /// metadata and carrying the slice `data`.
    pub fn new(
        part_no: u32,
        total_parts: u32,
        message: &Message,
        message_checksum: &str,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            part_no,
            total_parts,
            message_id: message.id,
            message_user: message.user.clone(),
            message_organisation: message.organisation.clone(),
            message_device: message.device.clone(),
            message_type: message.message_type.clone(),
            message_type_version: message.type_version,
            message_correlation_id: message.correlation_id,
            message_priority: message.priority,
            message_created: message.created,
            message_data_hash: message.data_hash.clone(),
            message_encryption_scheme: message.encryption_scheme,
            message_encryption_iv: message.encryption_iv.clone(),
            message_checksum: message_checksum.to_string(),
            data,
            status: MessagePartStatus::Initialised,
            download_attempts: 0,
            lock_name: None,
            updated: None,
        }
    }

    pub fn message_type_key(&self) -> MessageTypeKey {
        MessageTypeKey::new(self.message_type.clone(), self.message_type_version)
    }
}

impl fmt::Display for MessagePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MessagePart {{id=\"{}\", part={}/{}, message=\"{}\", type=\"{}\", device=\"{}\", size={}}}",
            self.id,
            self.part_no,
            self.total_parts,
            self.message_id,
            self.message_type,
            self.message_device,
            self.data.len()
        )
    }
}
