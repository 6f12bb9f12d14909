//! The `error` module defines the error taxonomy shared by every layer of
//! `courier`: chunking, translation, transport and the dispatch queue.
//!
//! Integrity and decryption failures are never recovered from silently; they
//! always surface to the caller as their own variants.

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, MessagingError>;

#[derive(Error, Debug)]
pub enum MessagingError {
    // ===== Input & Reassembly Errors =====
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Incomplete message part set for message ({message_id}): found {found} of {expected} parts")]
    IncompleteSet {
        message_id: Uuid,
        found: usize,
        expected: u32,
    },

    #[error("Duplicate message part ({part_no}) for message ({message_id})")]
    DuplicatePart { message_id: Uuid, part_no: u32 },

    #[error("Checksum mismatch for message ({message_id}): expected ({expected}) but got ({actual})")]
    ChecksumMismatch {
        message_id: Uuid,
        expected: String,
        actual: String,
    },

    // ===== Crypto Errors =====
    #[error("Integrity check failed for message ({message_id}): expected data hash ({expected}) but got ({actual})")]
    IntegrityError {
        message_id: Uuid,
        expected: String,
        actual: String,
    },

    #[error("Failed to decrypt the message data: {0}")]
    DecryptionError(String),

    #[error("Unknown message type ({message_type}) and version ({version}): {detail}")]
    UnknownType {
        message_type: String,
        version: u32,
        detail: String,
    },

    // ===== Transport Errors =====
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // ===== Processing Errors =====
    #[error("Failed to process the message ({message_id}): {detail}")]
    ProcessingFailed { message_id: Uuid, detail: String },

    #[error("The message ({message_id}) failed permanently after {attempts} processing attempts")]
    Fatal { message_id: Uuid, attempts: u32 },

    // ===== Storage & Serialization Errors =====
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Envelope encoding error: {0}")]
    Envelope(#[from] bincode::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MessagingError {
    /// Errors that indicate tampering, corruption or a key mismatch.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            MessagingError::ChecksumMismatch { .. }
                | MessagingError::IntegrityError { .. }
                | MessagingError::DecryptionError(_)
        )
    }
}
