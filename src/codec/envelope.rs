use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{EncryptionScheme, Message, MessagePart};

pub const SUCCESS: i32 = 0;
pub const ERROR_INVALID_REQUEST: i32 = -1;
pub const ERROR_UNRECOGNISED_TYPE: i32 = -2;
pub const ERROR_QUEUEING_FAILED: i32 = -3;
pub const ERROR_PROCESSING_FAILED: i32 = -4;
pub const ERROR_UNKNOWN: i32 = -5;

/// The outcome of submitting a whole message. `message` carries the
/// response of a synchronously processed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResult {
    pub code: i32,
    pub detail: String,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePartResult {
    pub code: i32,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDownloadRequest {
    pub device: String,
    pub user: String,
    pub encryption_scheme: EncryptionScheme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDownloadResponse {
    pub code: i32,
    pub detail: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceivedRequest {
    pub device: String,
    pub message_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceivedResponse {
    pub code: i32,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePartDownloadRequest {
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePartDownloadResponse {
    pub code: i32,
    pub detail: String,
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePartReceivedRequest {
    pub device: String,
    pub message_part_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePartReceivedResponse {
    pub code: i32,
    pub detail: String,
}

/// Every document that can be the body of a `POST /messaging`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Envelope {
    Message(Message),
    MessageResult(MessageResult),
    MessagePart(MessagePart),
    MessagePartResult(MessagePartResult),
    MessageDownloadRequest(MessageDownloadRequest),
    MessageDownloadResponse(MessageDownloadResponse),
    MessageReceivedRequest(MessageReceivedRequest),
    MessageReceivedResponse(MessageReceivedResponse),
    MessagePartDownloadRequest(MessagePartDownloadRequest),
    MessagePartDownloadResponse(MessagePartDownloadResponse),
    MessagePartReceivedRequest(MessagePartReceivedRequest),
    MessagePartReceivedResponse(MessagePartReceivedResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Message,
    MessageResult,
    MessagePart,
    MessagePartResult,
    MessageDownloadRequest,
    MessageDownloadResponse,
    MessageReceivedRequest,
    MessageReceivedResponse,
    MessagePartDownloadRequest,
    MessagePartDownloadResponse,
    MessagePartReceivedRequest,
    MessagePartReceivedResponse,
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Message(_) => EnvelopeKind::Message,
            Envelope::MessageResult(_) => EnvelopeKind::MessageResult,
            Envelope::MessagePart(_) => EnvelopeKind::MessagePart,
            Envelope::MessagePartResult(_) => EnvelopeKind::MessagePartResult,
            Envelope::MessageDownloadRequest(_) => EnvelopeKind::MessageDownloadRequest,
            Envelope::MessageDownloadResponse(_) => EnvelopeKind::MessageDownloadResponse,
            Envelope::MessageReceivedRequest(_) => EnvelopeKind::MessageReceivedRequest,
            Envelope::MessageReceivedResponse(_) => EnvelopeKind::MessageReceivedResponse,
            Envelope::MessagePartDownloadRequest(_) => EnvelopeKind::MessagePartDownloadRequest,
            Envelope::MessagePartDownloadResponse(_) => EnvelopeKind::MessagePartDownloadResponse,
            Envelope::MessagePartReceivedRequest(_) => EnvelopeKind::MessagePartReceivedRequest,
            Envelope::MessagePartReceivedResponse(_) => EnvelopeKind::MessagePartReceivedResponse,
        }
    }

    /// Whether the fields a receiver routes on are present.
    pub(crate) fn has_required_fields(&self) -> bool {
        match self {
            Envelope::Message(m) => {
                !m.message_type.is_empty()
                    && !m.user.is_empty()
                    && !m.organisation.is_empty()
                    && !m.device.is_empty()
            }
            Envelope::MessagePart(p) => {
                !p.message_type.is_empty()
                    && !p.message_device.is_empty()
                    && p.part_no >= 1
                    && p.part_no <= p.total_parts
            }
            Envelope::MessageDownloadRequest(r) => !r.device.is_empty() && !r.user.is_empty(),
            Envelope::MessageReceivedRequest(r) => !r.device.is_empty(),
            Envelope::MessagePartDownloadRequest(r) => !r.device.is_empty(),
            Envelope::MessagePartReceivedRequest(r) => !r.device.is_empty(),
            _ => true,
        }
    }
}
