use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::auth::ConfigAuthenticator;
use super::handler::{MessageHandler, ProcessingMode, SystemMessageHandler};
use crate::chunking::{PartAssembler, needs_split, split};
use crate::config::{MessagingSettings, Settings};
use crate::crypto::{self, KeyDeriver};
use crate::message::{
    EncryptionScheme, Message, MessagePart, MessagePartStatus, MessageStatus, MessageTypeKey,
};
use crate::persistence::{MessageRepository, SledStore};
use crate::utils::{MessagingError, Result};

/// The server side of the messaging protocol.
///
/// Synchronous messages are processed while the sender waits. Asynchronous
/// messages are queued and picked up by the `BackgroundMessageProcessor`,
/// which stages their responses for download.
pub struct MessagingService {
    repository: Arc<dyn MessageRepository>,
    handlers: Vec<Arc<dyn MessageHandler>>,
    key_deriver: KeyDeriver,
    settings: MessagingSettings,
    lock_name: String,
    notify: Notify,
}

impl MessagingService {
    pub fn new(
        settings: MessagingSettings,
        lock_name: impl Into<String>,
        repository: Arc<dyn MessageRepository>,
    ) -> Result<Self> {
        let key_deriver = KeyDeriver::from_base64(&settings.master_key)?;
        Ok(Self {
            repository,
            handlers: Vec::new(),
            key_deriver,
            settings,
            lock_name: lock_name.into(),
            notify: Notify::new(),
        })
    }

    /// A service with the `SystemMessageHandler` registered, authenticating
    /// against `settings.auth`.
    pub fn with_system_handler(
        settings: &Settings,
        repository: Arc<dyn MessageRepository>,
    ) -> Result<Self> {
        let mut service = Self::new(
            settings.messaging.clone(),
            settings.server.instance_name.clone(),
            repository.clone(),
        )?;
        service.register_handler(Arc::new(SystemMessageHandler::new(
            Arc::new(ConfigAuthenticator::new(&settings.auth)),
            service.key_deriver.clone(),
            repository,
        )));
        Ok(service)
    }

    /// Opens the sled database at `settings.messaging.database_path`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let repository = Arc::new(SledStore::open(&settings.messaging.database_path)?);
        Self::with_system_handler(settings, repository)
    }

    pub fn register_handler(&mut self, handler: Arc<dyn MessageHandler>) {
        self.handlers.push(handler);
    }

    pub fn settings(&self) -> &MessagingSettings {
        &self.settings
    }

    pub fn repository(&self) -> &Arc<dyn MessageRepository> {
        &self.repository
    }

    pub fn lock_name(&self) -> &str {
        &self.lock_name
    }

    pub fn maximum_processing_attempts(&self) -> u32 {
        self.settings.maximum_processing_attempts
    }

    pub fn processing_retry_delay(&self) -> Duration {
        let millis = i64::try_from(self.settings.processing_retry_delay_ms).unwrap_or(i64::MAX);
        Duration::milliseconds(millis)
    }

    /// Resolves once a message has been queued for processing.
    pub async fn queued_for_processing(&self) {
        self.notify.notified().await
    }

    fn handler_for(
        &self,
        key: &MessageTypeKey,
    ) -> Option<(&Arc<dyn MessageHandler>, ProcessingMode)> {
        self.handlers
            .iter()
            .find_map(|handler| handler.mode(key).map(|mode| (handler, mode)))
    }

    fn unknown_type(message: &Message) -> MessagingError {
        MessagingError::UnknownType {
            message_type: message.message_type.clone(),
            version: message.type_version,
            detail: format!(
                "no handler is registered for the message ({}) from the user ({}) and device ({})",
                message.id, message.user, message.device
            ),
        }
    }

    pub fn derive_user_device_encryption_key(
        &self,
        scheme: EncryptionScheme,
        user: &str,
        organisation: &str,
        device: &str,
    ) -> Result<Vec<u8>> {
        self.key_deriver.derive(scheme, user, organisation, device)
    }

    /// Verifies `message` and returns a copy holding its plaintext.
    pub fn decrypt_message(&self, message: &Message) -> Result<Message> {
        if !message.has_valid_data_hash() {
            return Err(MessagingError::IntegrityError {
                message_id: message.id,
                expected: message.data_hash.clone(),
                actual: crypto::data_hash(&message.data),
            });
        }

        let mut decrypted = message.clone();
        if message.is_encrypted() {
            let key = self.derive_user_device_encryption_key(
                message.encryption_scheme,
                &message.user,
                &message.organisation,
                &message.device,
            )?;
            let data = crypto::decrypt(
                message.encryption_scheme,
                &key,
                &message.encryption_iv,
                &message.data,
            )?;
            decrypted.replace_data(data, EncryptionScheme::None, String::new());
        }
        Ok(decrypted)
    }

    /// Returns a copy of `message` encrypted with the key of its user and
    /// device. Already encrypted messages are returned unchanged.
    pub fn encrypt_message(&self, message: &Message, scheme: EncryptionScheme) -> Result<Message> {
        let mut encrypted = message.clone();
        if message.is_encrypted() || scheme == EncryptionScheme::None {
            return Ok(encrypted);
        }

        let key = self.derive_user_device_encryption_key(
            scheme,
            &message.user,
            &message.organisation,
            &message.device,
        )?;
        let sealed = crypto::encrypt(scheme, &key, &message.data)?;
        encrypted.replace_data(sealed.data, scheme, sealed.iv);
        Ok(encrypted)
    }

    fn prepare_response(&self, response: Message, scheme: EncryptionScheme) -> Result<Message> {
        if response.encryption_disabled {
            Ok(response)
        } else {
            self.encrypt_message(&response, scheme)
        }
    }

    /// Processes a message submitted by a device.
    ///
    /// Re-submitting a message that was already processed replays the
    /// response recorded the first time, and re-submitting one that is still
    /// queued does nothing.
    pub fn process_message(&self, message: Message) -> Result<Option<Message>> {
        if let Some(archived) = self.repository.get_archived_message(&message.id)? {
            info!(
                "Skipping the duplicate message ({}) that was already processed",
                message.id
            );
            return Ok(archived.response);
        }

        if self.repository.get_message(&message.id)?.is_some() {
            info!(
                "Skipping the duplicate message ({}) that is already queued",
                message.id
            );
            return Ok(None);
        }

        let decrypted = self.decrypt_message(&message)?;

        let Some((handler, mode)) = self.handler_for(&message.type_key()) else {
            return Err(Self::unknown_type(&message));
        };

        match mode {
            ProcessingMode::Synchronous => {
                debug!("Synchronously processing {message}");
                let response = handler.process(&decrypted).map_err(|e| {
                    MessagingError::ProcessingFailed {
                        message_id: message.id,
                        detail: e.to_string(),
                    }
                })?;
                let response = response
                    .map(|r| self.prepare_response(r, message.encryption_scheme))
                    .transpose()?;
                self.repository.archive_message(
                    &message,
                    response.as_ref(),
                    handler.is_archivable(&message.type_key()),
                )?;
                Ok(response)
            }
            ProcessingMode::Asynchronous => {
                self.queue_message_for_processing(message)?;
                Ok(None)
            }
        }
    }

    /// Queues `message` for the background processor. A message whose id is
    /// already stored is left as it is.
    pub fn queue_message_for_processing(&self, mut message: Message) -> Result<()> {
        message.status = MessageStatus::QueuedForProcessing;
        message.lock_name = None;
        message.updated = Some(Utc::now());
        if !self.repository.create_message(&message)? {
            info!(
                "Skipping the duplicate message ({}) that is already queued",
                message.id
            );
            return Ok(());
        }
        info!("Queued {message} for processing");
        self.notify.notify_one();
        Ok(())
    }

    /// Stages `message` for download by its device, encrypting it with
    /// `scheme` unless encryption is disabled for it. Messages above the
    /// asynchronous size limit are stored as parts.
    pub fn queue_message_for_download(
        &self,
        message: Message,
        scheme: EncryptionScheme,
    ) -> Result<()> {
        let mut message = self.prepare_response(message, scheme)?;

        if needs_split(&message, self.settings.max_async_message_size) {
            let parts = split(&message, self.settings.max_message_part_size)?;
            let total = parts.len();
            for mut part in parts {
                part.status = MessagePartStatus::QueuedForDownload;
                self.repository.create_message_part(&part)?;
            }
            info!("Queued {message} for download as {total} parts");
            return Ok(());
        }

        message.status = MessageStatus::QueuedForDownload;
        message.updated = Some(Utc::now());
        if !self.repository.create_message(&message)? {
            warn!("Skipping the duplicate response ({}) that is already queued", message.id);
            return Ok(());
        }
        info!("Queued {message} for download");
        Ok(())
    }

    /// Stores an uploaded part. Once every part of its message is present
    /// the message is reassembled, verified and queued for processing.
    pub fn queue_message_part_for_assembly(&self, mut part: MessagePart) -> Result<()> {
        let message_id = part.message_id;

        if self.is_known_message(&message_id)? {
            debug!(
                "Ignoring {part} of the message ({message_id}) that was already queued or processed"
            );
            return Ok(());
        }

        if self.repository.message_part_exists(&part.id)? {
            debug!("Ignoring the duplicate {part}");
            return Ok(());
        }

        part.status = MessagePartStatus::QueuedForAssembly;
        part.updated = Some(Utc::now());
        self.repository.create_message_part(&part)?;
        debug!("Queued {part} for assembly");

        self.assemble_if_complete(&message_id)
    }

    /// Whether `message_id` is queued, being processed, failed or archived.
    fn is_known_message(&self, message_id: &Uuid) -> Result<bool> {
        Ok(self.repository.is_message_archived(message_id)?
            || self.repository.get_message(message_id)?.is_some())
    }

    fn assemble_if_complete(&self, message_id: &Uuid) -> Result<()> {
        let parts = self.repository.message_parts_for_message(message_id)?;
        let Some(total_parts) = parts.first().map(|p| p.total_parts as usize) else {
            return Ok(());
        };
        if parts.len() < total_parts {
            return Ok(());
        }

        if !self.repository.try_lock_assembly(message_id, &self.lock_name)? {
            return Ok(());
        }

        let result = self.assemble(message_id);
        self.repository.release_assembly(message_id)?;
        result
    }

    /// Runs under the assembly lock. The parts are read again because an
    /// earlier lock holder may already have assembled and removed them.
    fn assemble(&self, message_id: &Uuid) -> Result<()> {
        if self.is_known_message(message_id)? {
            let discarded = self.repository.delete_message_parts_for_message(message_id)?;
            debug!(
                "Discarded {discarded} parts of the message ({message_id}) that was already queued or processed"
            );
            return Ok(());
        }

        let parts = self.repository.message_parts_for_message(message_id)?;
        let mut assembler = PartAssembler::new();
        let Some(result) = parts.into_iter().find_map(|part| assembler.add(part)) else {
            return Ok(());
        };

        let outcome = result.and_then(|m| self.decrypt_message(&m).map(|_| m));
        self.repository.delete_message_parts_for_message(message_id)?;
        let message = outcome.inspect_err(|e| {
            error!("Failed to assemble the message ({message_id}) from its parts: {e}");
        })?;

        info!("Assembled {message} from its parts");

        if self.handler_for(&message.type_key()).is_none() {
            return Err(Self::unknown_type(&message));
        }
        self.queue_message_for_processing(message)
    }

    /// The next batch of messages waiting for `device` and `user`.
    /// Unacknowledged messages are included again.
    pub fn messages_queued_for_download(
        &self,
        device: &str,
        user: &str,
        scheme: EncryptionScheme,
    ) -> Result<Vec<Message>> {
        let messages =
            self.repository
                .messages_for_download(device, user, self.settings.download_batch_size)?;

        if !messages.is_empty() {
            info!(
                "Found {} messages queued for download for the user ({user}) and device ({device})",
                messages.len()
            );
        }

        messages
            .into_iter()
            .map(|message| self.prepare_response(message, scheme))
            .collect()
    }

    pub fn message_parts_queued_for_download(&self, device: &str) -> Result<Vec<MessagePart>> {
        let parts = self
            .repository
            .message_parts_for_download(device, self.settings.download_batch_size)?;

        if !parts.is_empty() {
            info!(
                "Found {} message parts queued for download for the device ({device})",
                parts.len()
            );
        }
        Ok(parts)
    }

    /// Acknowledges a downloaded message. Unknown ids are ignored.
    /// Acknowledges a downloaded message. Only a message waiting for
    /// download by `device` is removed; any other id is ignored.
    pub fn message_downloaded(&self, device: &str, message_id: &Uuid) -> Result<()> {
        if self.repository.delete_downloaded_message(message_id, device)? {
            info!("The message ({message_id}) was downloaded by the device ({device})");
        } else {
            debug!(
                "Ignoring the acknowledgement from the device ({device}) for the message \
                 ({message_id}) that is not waiting for download by it"
            );
        }
        Ok(())
    }

    pub fn message_part_downloaded(&self, device: &str, message_part_id: &Uuid) -> Result<()> {
        if self
            .repository
            .delete_downloaded_message_part(message_part_id, device)?
        {
            debug!("The message part ({message_part_id}) was downloaded by the device ({device})");
        } else {
            debug!(
                "Ignoring the acknowledgement from the device ({device}) for the message part \
                 ({message_part_id}) that is not waiting for download by it"
            );
        }
        Ok(())
    }

    /// Returns messages this instance left in `Processing` to the queue and
    /// releases the assembly locks it left behind, assembling any message
    /// whose parts are all present. Returns the number of messages requeued.
    pub fn reset_message_locks(&self) -> Result<usize> {
        let reset = self.repository.reset_message_locks(
            &self.lock_name,
            MessageStatus::Processing,
            MessageStatus::QueuedForProcessing,
        )?;

        for message_id in self.repository.reset_assembly_locks(&self.lock_name)? {
            info!("Released the stale assembly lock for the message ({message_id})");
            if let Err(e) = self.assemble_if_complete(&message_id) {
                warn!("Failed to assemble the message ({message_id}) after releasing its lock: {e}");
            }
        }

        Ok(reset)
    }

    /// Removes archive entries older than the configured retention.
    pub fn prune_archive(&self) -> Result<usize> {
        let millis = self.settings.archive_retention_secs.saturating_mul(1000);
        let retention = Duration::milliseconds(i64::try_from(millis).unwrap_or(i64::MAX));
        match Utc::now().checked_sub_signed(retention) {
            Some(cutoff) => self.repository.prune_archive(cutoff),
            None => Ok(0),
        }
    }

    /// Claims and processes one queued message.
    ///
    /// Returns the id of the message and the status it was left in, or
    /// `None` when nothing is waiting.
    pub fn process_next_queued_message(&self) -> Result<Option<(Uuid, MessageStatus)>> {
        let retry_before = Utc::now() - self.processing_retry_delay();
        let Some(message) = self
            .repository
            .claim_next_message_for_processing(retry_before, &self.lock_name)?
        else {
            return Ok(None);
        };

        match self.process_claimed(&message) {
            Ok(()) => Ok(Some((message.id, MessageStatus::Processed))),
            Err(e) => {
                let maximum_attempts = self.maximum_processing_attempts();
                let status = self
                    .repository
                    .record_failed_processing_attempt(&message.id, maximum_attempts)?
                    .map_or(MessageStatus::Failed, |m| m.status);

                if status == MessageStatus::Failed {
                    error!(
                        "{}: {e}",
                        MessagingError::Fatal {
                            message_id: message.id,
                            attempts: maximum_attempts,
                        }
                    );
                } else {
                    warn!("Failed to process {message}, it will be retried: {e}");
                }
                Ok(Some((message.id, status)))
            }
        }
    }

    fn process_claimed(&self, message: &Message) -> Result<()> {
        let decrypted = self.decrypt_message(message)?;
        let Some((handler, _)) = self.handler_for(&message.type_key()) else {
            return Err(Self::unknown_type(message));
        };

        let response =
            handler
                .process(&decrypted)
                .map_err(|e| MessagingError::ProcessingFailed {
                    message_id: message.id,
                    detail: e.to_string(),
                })?;

        if let Some(response) = response {
            self.queue_message_for_download(response, message.encryption_scheme)?;
        }

        self.repository
            .archive_message(message, None, handler.is_archivable(&message.type_key()))?;
        self.repository.delete_message(&message.id)?;
        info!("Processed {message}");
        Ok(())
    }
}

impl std::fmt::Debug for MessagingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingService")
            .field("lock_name", &self.lock_name)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
