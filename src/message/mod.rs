//! The `message` module defines the routable units exchanged between devices
//! and the server: the `Message` itself and the `MessagePart` fragments an
//! oversized message is split into.

pub mod error_report;
#[allow(clippy::module_inception)]
pub mod message;
pub mod part;

pub use error_report::ErrorReport;
pub use message::{EncryptionScheme, Message, MessageStatus, MessageTypeKey, Priority};
pub use part::{MessagePart, MessagePartStatus};

#[cfg(test)]
mod tests;
