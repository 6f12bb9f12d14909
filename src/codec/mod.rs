//! Byte encoding of the documents exchanged on `POST /messaging`.
//!
//! The wire grammar lives behind `EnvelopeCodec` so transports never touch
//! bytes directly. `BincodeCodec` is the only implementation shipped.

pub mod envelope;

pub use envelope::{
    ERROR_INVALID_REQUEST, ERROR_PROCESSING_FAILED, ERROR_QUEUEING_FAILED, ERROR_UNKNOWN,
    ERROR_UNRECOGNISED_TYPE, Envelope, EnvelopeKind, MessageDownloadRequest,
    MessageDownloadResponse, MessagePartDownloadRequest, MessagePartDownloadResponse,
    MessagePartReceivedRequest, MessagePartReceivedResponse, MessagePartResult,
    MessageReceivedRequest, MessageReceivedResponse, MessageResult, SUCCESS,
};

use crate::utils::Result;

pub const CONTENT_TYPE: &str = "application/octet-stream";

pub trait EnvelopeCodec: Send + Sync {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Envelope>;

    /// Whether `envelope` is a well-formed document of kind `kind`.
    fn is_valid_document(&self, envelope: &Envelope, kind: EnvelopeKind) -> bool {
        envelope.kind() == kind && envelope.has_required_fields()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl EnvelopeCodec for BincodeCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        Ok(bincode::serialize(envelope)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Envelope> {
        Ok(bincode::deserialize(bytes)?)
    }
}
