use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::crypto;

/// The encryption scheme applied to a message's `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncryptionScheme {
    #[default]
    None,
    AesCfb,
}

impl fmt::Display for EncryptionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionScheme::None => write!(f, "None"),
            EncryptionScheme::AesCfb => write!(f, "AES-CFB"),
        }
    }
}

/// Advisory ordering hint for the server. Not a delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn code(self) -> i32 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 5,
            Priority::High => 10,
        }
    }
}

/// Lifecycle of a message on either side of the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MessageStatus {
    #[default]
    Initialised,
    QueuedForSending,
    QueuedForProcessing,
    Aborted,
    Failed,
    Processing,
    Sending,
    QueuedForDownload,
    Downloading,
    Processed,
}

/// Identifies the logical payload carried by a message: `(type, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageTypeKey {
    pub message_type: String,
    pub version: u32,
}

impl MessageTypeKey {
    pub fn new(message_type: impl Into<String>, version: u32) -> Self {
        Self {
            message_type: message_type.into(),
            version,
        }
    }
}

impl fmt::Display for MessageTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.message_type, self.version)
    }
}

/// A routable unit of work or response.
///
/// `data_hash` is the base64 SHA-1 digest of `data` exactly as carried,
/// i.e. after encryption when `encryption_scheme` is not `None`. It is
/// computed once on construction and verified by the receiver before
/// anything else is done with the payload.
///
/// The fields after `status` are server-side bookkeeping. Only `status` and
/// the attempt counters change once a message has been created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub user: String,
    pub organisation: String,
    pub device: String,
    pub message_type: String,
    pub type_version: u32,
    pub correlation_id: Option<Uuid>,
    pub priority: i32,
    pub created: DateTime<Utc>,
    pub data: Vec<u8>,
    pub data_hash: String,
    pub encryption_scheme: EncryptionScheme,
    pub encryption_iv: String,
    pub status: MessageStatus,

    #[serde(default)]
    pub process_attempts: u32,
    #[serde(default)]
    pub download_attempts: u32,
    #[serde(default)]
    pub lock_name: Option<String>,
    #[serde(default)]
    pub last_processed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    /// Set on responses that must reach the device in plaintext, such as the
    /// registration response that carries the device's key.
    #[serde(default)]
    pub encryption_disabled: bool,
}

impl Message {
    /// Creates an unencrypted message with a freshly assigned id.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user: impl Into<String>,
        organisation: impl Into<String>,
        device: impl Into<String>,
        message_type: impl Into<String>,
        type_version: u32,
        correlation_id: Option<Uuid>,
        priority: i32,
        data: Vec<u8>,
    ) -> Self {
        Self::with_encryption(
            user,
            organisation,
            device,
            message_type,
            type_version,
            correlation_id,
            priority,
            data,
            EncryptionScheme::None,
            String::new(),
        )
    }

    /// Creates a message whose `data` has already been encrypted with
    /// `scheme` using the base64 encoded `encryption_iv`.
    #[allow(clippy::too_many_arguments)]
    pub fn with_encryption(
        user: impl Into<String>,
        organisation: impl Into<String>,
        device: impl Into<String>,
        message_type: impl Into<String>,
        type_version: u32,
        correlation_id: Option<Uuid>,
        priority: i32,
        data: Vec<u8>,
        scheme: EncryptionScheme,
        encryption_iv: String,
    ) -> Self {
        let data_hash = crypto::data_hash(&data);
        Self {
            id: Uuid::new_v4(),
            user: user.into(),
            organisation: organisation.into(),
            device: device.into(),
            message_type: message_type.into(),
            type_version,
            correlation_id,
            priority,
            created: Utc::now(),
            data,
            data_hash,
            encryption_scheme: scheme,
            encryption_iv,
            status: MessageStatus::Initialised,
            process_attempts: 0,
            download_attempts: 0,
            lock_name: None,
            last_processed: None,
            updated: None,
            encryption_disabled: false,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption_scheme != EncryptionScheme::None
    }

    pub fn type_key(&self) -> MessageTypeKey {
        MessageTypeKey::new(self.message_type.clone(), self.type_version)
    }

    /// Recomputes the digest of `data` and compares it with `data_hash`.
    pub fn has_valid_data_hash(&self) -> bool {
        crypto::data_hash(&self.data) == self.data_hash
    }

    /// Replaces the payload, keeping `data_hash` in step with it.
    pub(crate) fn replace_data(
        &mut self,
        data: Vec<u8>,
        scheme: EncryptionScheme,
        encryption_iv: String,
    ) {
        self.data_hash = crypto::data_hash(&data);
        self.data = data;
        self.encryption_scheme = scheme;
        self.encryption_iv = encryption_iv;
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message {{id=\"{}\", type=\"{}\", version=\"{}\", user=\"{}\", device=\"{}\", \
             status={:?}, encryption={}, size={}}}",
            self.id,
            self.message_type,
            self.type_version,
            self.user,
            self.device,
            self.status,
            self.encryption_scheme,
            self.data.len()
        )
    }
}
