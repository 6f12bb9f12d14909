use tracing::debug;
use uuid::Uuid;

use super::payloads::{MessageData, Payload};
use super::registry::PayloadRegistry;
use crate::crypto;
use crate::message::{EncryptionScheme, Message};
use crate::utils::{MessagingError, Result};

/// Converts typed payloads to `Message` envelopes and back for one
/// user/organisation/device.
///
/// When built `with_encryption`, outbound payloads are encrypted with a
/// fresh IV each time. Inbound messages are decrypted according to their
/// own `encryption_scheme` with the key this translator holds.
#[derive(Clone)]
pub struct MessageTranslator {
    user: String,
    organisation: String,
    device: String,
    encryption_scheme: EncryptionScheme,
    encryption_key: Vec<u8>,
}

impl MessageTranslator {
    pub fn new(
        user: impl Into<String>,
        organisation: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self::with_encryption(user, organisation, device, EncryptionScheme::None, Vec::new())
    }

    pub fn with_encryption(
        user: impl Into<String>,
        organisation: impl Into<String>,
        device: impl Into<String>,
        encryption_scheme: EncryptionScheme,
        encryption_key: Vec<u8>,
    ) -> Self {
        Self {
            user: user.into(),
            organisation: organisation.into(),
            device: device.into(),
            encryption_scheme,
            encryption_key,
        }
    }

    pub fn encryption_scheme(&self) -> EncryptionScheme {
        self.encryption_scheme
    }

    pub fn to_message<T: MessageData>(
        &self,
        data: &T,
        correlation_id: Option<Uuid>,
    ) -> Result<Message> {
        for (field, value) in [
            ("user", &self.user),
            ("organisation", &self.organisation),
            ("device", &self.device),
        ] {
            if value.is_empty() {
                return Err(MessagingError::InvalidInput(format!(
                    "Failed to create the message with type ({}): no {field} was specified",
                    T::MESSAGE_TYPE
                )));
            }
        }

        let plaintext = serde_json::to_vec(data)?;
        let sealed = crypto::encrypt(self.encryption_scheme, &self.encryption_key, &plaintext)?;

        let message = Message::with_encryption(
            self.user.clone(),
            self.organisation.clone(),
            self.device.clone(),
            T::MESSAGE_TYPE,
            T::MESSAGE_TYPE_VERSION,
            correlation_id,
            T::MESSAGE_TYPE_PRIORITY.code(),
            sealed.data,
            self.encryption_scheme,
            sealed.iv,
        );

        debug!("Created {message}");
        Ok(message)
    }

    pub fn from_message<T: MessageData>(&self, message: &Message) -> Result<T> {
        let data = self.open(message)?;

        if message.message_type != T::MESSAGE_TYPE || message.type_version != T::MESSAGE_TYPE_VERSION
        {
            return Err(MessagingError::UnknownType {
                message_type: message.message_type.clone(),
                version: message.type_version,
                detail: format!(
                    "expected the message type ({}) and version ({})",
                    T::MESSAGE_TYPE,
                    T::MESSAGE_TYPE_VERSION
                ),
            });
        }

        Ok(serde_json::from_slice(&data)?)
    }

    /// Verifies and decrypts `message`, then decodes it with the decoder
    /// `registry` holds for its `(type, version)`.
    pub fn decode_payload(&self, message: &Message, registry: &PayloadRegistry) -> Result<Payload> {
        let data = self.open(message)?;

        match registry.decode(&message.type_key(), &data) {
            Some(payload) => Ok(payload?),
            None => Err(MessagingError::UnknownType {
                message_type: message.message_type.clone(),
                version: message.type_version,
                detail: "no payload is registered for this type".to_string(),
            }),
        }
    }

    fn open(&self, message: &Message) -> Result<Vec<u8>> {
        let actual = crypto::data_hash(&message.data);
        if actual != message.data_hash {
            return Err(MessagingError::IntegrityError {
                message_id: message.id,
                expected: message.data_hash.clone(),
                actual,
            });
        }

        crypto::decrypt(
            message.encryption_scheme,
            &self.encryption_key,
            &message.encryption_iv,
            &message.data,
        )
    }
}

impl std::fmt::Debug for MessageTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageTranslator")
            .field("user", &self.user)
            .field("organisation", &self.organisation)
            .field("device", &self.device)
            .field("encryption_scheme", &self.encryption_scheme)
            .finish()
    }
}
