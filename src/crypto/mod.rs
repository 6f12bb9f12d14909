//! Digest and cipher primitives used by the translator and the dispatch queue.
//!
//! - `data_hash` produces the base64 SHA-1 digest used for both `data_hash`
//!   and `message_checksum`.
//! - `cipher` encrypts and decrypts message data for an `EncryptionScheme`.
//! - `keys` derives the per-user/device keys handed out at registration.
//!
//! SHA-1 detects corruption in transit and after reassembly. It is not a
//! defence against an active attacker.

pub mod cipher;
pub mod keys;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

pub use cipher::{Sealed, decrypt, encrypt};
pub use keys::KeyDeriver;

/// Base64 encoded SHA-1 digest of `data`.
pub fn data_hash(data: &[u8]) -> String {
    BASE64.encode(Sha1::digest(data))
}

#[cfg(test)]
mod tests;
