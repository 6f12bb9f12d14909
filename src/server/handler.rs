use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::auth::Authenticator;
use crate::crypto::KeyDeriver;
use crate::message::{ErrorReport, Message, MessageTypeKey};
use crate::persistence::MessageRepository;
use crate::translator::{
    AnotherTestRequest, AnotherTestResponse, AuthenticateRequest, AuthenticateResponse,
    CheckUserExistsRequest, CheckUserExistsResponse,
    MessageData, MessagePartDownloadTestRequest, MessagePartDownloadTestResponse,
    MessageTranslator, Payload, PayloadRegistry, RegisterRequest, RegisterResponse,
    SubmitErrorReportRequest, SubmitErrorReportResponse,
};
use crate::utils::MessagingError;

/// Size of the response to a `MessagePartDownloadTestRequest`.
pub const PART_DOWNLOAD_TEST_SIZE: usize = 128 * 1024;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Failed to process the message ({message_type}): {detail}")]
    Failed {
        message_type: String,
        detail: String,
    },
    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

/// Whether the sender waits for the handler's response in the same HTTP
/// exchange, or the message is queued and the response downloaded later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    Synchronous,
    Asynchronous,
}

/// Processes the messages of one or more `(type, version)` pairs.
///
/// `process` receives the message with its payload already decrypted.
pub trait MessageHandler: Send + Sync {
    /// The processing mode for `key`, or `None` when not handled here.
    fn mode(&self, key: &MessageTypeKey) -> Option<ProcessingMode>;

    /// Whether the full request is kept in the archive once processed.
    /// Only the id is kept otherwise, which is enough to detect duplicates.
    fn is_archivable(&self, _key: &MessageTypeKey) -> bool {
        true
    }

    fn process(&self, message: &Message) -> Result<Option<Message>, HandlerError>;
}

/// Handles the built-in registration, user lookup, test and error report
/// messages.
pub struct SystemMessageHandler {
    authenticator: Arc<dyn Authenticator>,
    key_deriver: KeyDeriver,
    repository: Arc<dyn MessageRepository>,
    registry: PayloadRegistry,
}

impl SystemMessageHandler {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        key_deriver: KeyDeriver,
        repository: Arc<dyn MessageRepository>,
    ) -> Self {
        Self {
            authenticator,
            key_deriver,
            repository,
            registry: PayloadRegistry::with_system_payloads(),
        }
    }

    fn register(
        &self,
        translator: &MessageTranslator,
        request: &Message,
        data: RegisterRequest,
    ) -> Result<Message, HandlerError> {
        let response = match self
            .authenticator
            .authenticate(&data.user, &data.password, &data.device)
        {
            Ok(()) => {
                let key = self.key_deriver.derive(
                    data.preferred_encryption_scheme,
                    &data.user,
                    &data.organisation,
                    &data.device,
                )?;
                info!(
                    "Generated the encryption key using the encryption scheme ({}) for the user ({}) \
                     from the organisation ({}) using the device ({})",
                    data.preferred_encryption_scheme, data.user, data.organisation, data.device
                );
                RegisterResponse::success(data.preferred_encryption_scheme, key)
            }
            Err(e) => {
                warn!("{e}");
                RegisterResponse::failure(
                    RegisterResponse::ERROR_CODE_AUTHENTICATION_FAILED,
                    format!("Failed to authenticate the user ({})", data.user),
                )
            }
        };

        let mut message = translator.to_message(&response, Some(request.id))?;
        message.encryption_disabled = true;
        Ok(message)
    }

    /// Checks the credentials of an already registered device and hands
    /// back its key. Failures are reported in the response.
    fn authenticate(
        &self,
        translator: &MessageTranslator,
        request: &Message,
        data: AuthenticateRequest,
    ) -> Result<Message, HandlerError> {
        let response = match self
            .authenticator
            .authenticate(&data.user, &data.password, &data.device)
        {
            Ok(()) => {
                let key = self.key_deriver.derive(
                    data.preferred_encryption_scheme,
                    &data.user,
                    &data.organisation,
                    &data.device,
                )?;
                info!(
                    "Authenticated the user ({}) from the organisation ({}) using the device ({})",
                    data.user, data.organisation, data.device
                );
                AuthenticateResponse::success(data.preferred_encryption_scheme, key)
            }
            Err(e) => {
                warn!("{e}");
                AuthenticateResponse::failure(format!(
                    "Failed to authenticate the user ({})",
                    data.user
                ))
            }
        };

        let mut message = translator.to_message(&response, Some(request.id))?;
        message.encryption_disabled = true;
        Ok(message)
    }

    fn check_user_exists(
        &self,
        translator: &MessageTranslator,
        request: &Message,
        data: CheckUserExistsRequest,
    ) -> Result<Message, HandlerError> {
        let response = CheckUserExistsResponse {
            code: 0,
            detail: String::new(),
            user_exists: self.authenticator.user_exists(&data.user, &data.organisation),
        };
        Ok(translator.to_message(&response, Some(request.id))?)
    }

    fn submit_error_report(
        &self,
        translator: &MessageTranslator,
        request: &Message,
        data: SubmitErrorReportRequest,
    ) -> Result<Message, HandlerError> {
        let report = ErrorReport {
            id: data.id,
            application_id: data.application_id,
            application_version: data.application_version,
            description: data.description,
            detail: data.detail,
            feedback: data.feedback,
            created: data.when,
            who: data.who,
            device: data.device,
            data: data.data,
        };
        self.repository.create_error_report(&report)?;
        info!(
            "Stored the error report ({}) submitted by ({}) from the device ({})",
            report.id, report.who, report.device
        );

        let response = SubmitErrorReportResponse {
            code: 0,
            detail: "Success".to_string(),
            error_report_id: report.id,
        };
        Ok(translator.to_message(&response, Some(request.id))?)
    }
}

impl MessageHandler for SystemMessageHandler {
    fn mode(&self, key: &MessageTypeKey) -> Option<ProcessingMode> {
        if *key == RegisterRequest::type_key()
            || *key == AuthenticateRequest::type_key()
            || *key == CheckUserExistsRequest::type_key()
        {
            Some(ProcessingMode::Synchronous)
        } else if *key == AnotherTestRequest::type_key()
            || *key == MessagePartDownloadTestRequest::type_key()
            || *key == SubmitErrorReportRequest::type_key()
        {
            Some(ProcessingMode::Asynchronous)
        } else {
            None
        }
    }

    /// Credentials and the test payloads are not kept in the archive.
    fn is_archivable(&self, key: &MessageTypeKey) -> bool {
        *key == CheckUserExistsRequest::type_key() || *key == SubmitErrorReportRequest::type_key()
    }

    fn process(&self, message: &Message) -> Result<Option<Message>, HandlerError> {
        let translator =
            MessageTranslator::new(&message.user, &message.organisation, &message.device);

        let response = match translator.decode_payload(message, &self.registry)? {
            Payload::RegisterRequest(data) => self.register(&translator, message, data)?,
            Payload::AuthenticateRequest(data) => self.authenticate(&translator, message, data)?,
            Payload::CheckUserExistsRequest(data) => {
                self.check_user_exists(&translator, message, data)?
            }
            Payload::AnotherTestRequest(data) => {
                debug!("Echoing the test value ({})", data.test_value);
                let response = AnotherTestResponse {
                    test_value: data.test_value,
                    test_data: data.test_data,
                };
                translator.to_message(&response, Some(message.id))?
            }
            Payload::MessagePartDownloadTestRequest(_) => {
                let response = MessagePartDownloadTestResponse {
                    test_data: vec![0u8; PART_DOWNLOAD_TEST_SIZE],
                };
                translator.to_message(&response, Some(message.id))?
            }
            Payload::SubmitErrorReportRequest(data) => {
                self.submit_error_report(&translator, message, data)?
            }
            _ => {
                return Err(HandlerError::Failed {
                    message_type: message.message_type.clone(),
                    detail: format!(
                        "the message ({}) is not a request that can be processed",
                        message.id
                    ),
                });
            }
        };

        Ok(Some(response))
    }
}
