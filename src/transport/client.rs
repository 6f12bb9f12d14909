use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};
use uuid::Uuid;

use super::poller::{DownloadPoller, PollPolicy};
use crate::chunking::{PartAssembler, needs_split, split};
use crate::codec::{
    self, BincodeCodec, Envelope, EnvelopeCodec, MessageDownloadRequest,
    MessagePartDownloadRequest, MessagePartReceivedRequest, MessageReceivedRequest, SUCCESS,
};
use crate::config::Settings;
use crate::message::{EncryptionScheme, Message, MessagePart};
use crate::translator::{
    AuthenticateRequest, AuthenticateResponse, MessageTranslator, RegisterRequest,
    RegisterResponse,
};
use crate::utils::{MessagingError, Result};

/// Where an outbound message is in its journey to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Built,
    SentWhole,
    Split { total_parts: usize },
    SendingParts { sent: usize, total_parts: usize },
    AllPartsAcked,
}

/// The outcome of `MessagingClient::send`.
#[derive(Debug, Clone, PartialEq)]
pub struct SendReport {
    pub message_id: Uuid,
    pub state: SendState,
    pub parts_sent: usize,
    /// The response to a synchronously processed message.
    pub response: Option<Message>,
}

/// What a device holds after registering: the key and scheme to use for
/// every following message.
#[derive(Clone)]
pub struct Session {
    pub user: String,
    pub organisation: String,
    pub device: String,
    pub encryption_scheme: EncryptionScheme,
    pub encryption_key: Vec<u8>,
}

impl Session {
    pub fn translator(&self) -> MessageTranslator {
        MessageTranslator::with_encryption(
            &self.user,
            &self.organisation,
            &self.device,
            self.encryption_scheme,
            self.encryption_key.clone(),
        )
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("organisation", &self.organisation)
            .field("device", &self.device)
            .field("encryption_scheme", &self.encryption_scheme)
            .finish()
    }
}

/// The device side of the messaging protocol.
///
/// Every call is one HTTP exchange awaited in sequence. Nothing is retried
/// here; a failed call returns `TransportFailure` and the caller decides
/// whether to start over.
#[derive(Clone)]
pub struct MessagingClient {
    http: reqwest::Client,
    endpoint: String,
    codec: Arc<dyn EnvelopeCodec>,
    max_async_message_size: usize,
    max_message_part_size: usize,
}

impl MessagingClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        max_async_message_size: usize,
        max_message_part_size: usize,
    ) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
            codec: Arc::new(BincodeCodec),
            max_async_message_size,
            max_message_part_size,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.client.endpoint.clone(),
            Duration::from_secs(settings.client.timeout_secs),
            settings.messaging.max_async_message_size,
            settings.messaging.max_message_part_size,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn exchange(&self, request: &Envelope) -> Result<Envelope> {
        let body = self.codec.encode(request)?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, codec::CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                MessagingError::TransportFailure(format!(
                    "Failed to send a {:?} to ({}): {e}",
                    request.kind(),
                    self.endpoint
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MessagingError::TransportFailure(format!(
                "The server ({}) returned the HTTP status ({status}) for a {:?}",
                self.endpoint,
                request.kind()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            MessagingError::TransportFailure(format!(
                "Failed to read the reply from ({}): {e}",
                self.endpoint
            ))
        })?;

        self.codec.decode(&bytes)
    }

    fn unexpected(reply: &Envelope) -> MessagingError {
        MessagingError::TransportFailure(format!("Unexpected {:?} reply", reply.kind()))
    }

    fn check(code: i32, detail: &str, what: String) -> Result<()> {
        if code == SUCCESS {
            Ok(())
        } else {
            Err(MessagingError::TransportFailure(format!(
                "{what} failed with the code ({code}): {detail}"
            )))
        }
    }

    /// Sends `message` whole, or as parts when it is larger than the
    /// asynchronous size limit. Parts go one at a time and each must be
    /// accepted before the next is sent.
    pub async fn send(&self, message: &Message) -> Result<SendReport> {
        debug!("{message} is {:?}", SendState::Built);

        if !needs_split(message, self.max_async_message_size) {
            let reply = self.exchange(&Envelope::Message(message.clone())).await?;
            let Envelope::MessageResult(result) = reply else {
                return Err(Self::unexpected(&reply));
            };
            Self::check(
                result.code,
                &result.detail,
                format!("Sending the message ({})", message.id),
            )?;

            info!("Sent {message}");
            return Ok(SendReport {
                message_id: message.id,
                state: SendState::SentWhole,
                parts_sent: 0,
                response: result.message,
            });
        }

        let parts = split(message, self.max_message_part_size)?;
        let total_parts = parts.len();
        debug!("{message} is {:?}", SendState::Split { total_parts });

        for (sent, part) in parts.into_iter().enumerate() {
            debug!(
                "{message} is {:?}",
                SendState::SendingParts { sent, total_parts }
            );
            let what = format!(
                "Sending the part {} of {total_parts} ({}) of the message ({})",
                part.part_no, part.id, message.id
            );

            let reply = self
                .exchange(&Envelope::MessagePart(part))
                .await
                .map_err(|e| MessagingError::TransportFailure(format!("{what} failed: {e}")))?;
            let Envelope::MessagePartResult(result) = reply else {
                return Err(Self::unexpected(&reply));
            };
            Self::check(result.code, &result.detail, what)?;
        }

        info!("Sent {message} as {total_parts} parts");
        Ok(SendReport {
            message_id: message.id,
            state: SendState::AllPartsAcked,
            parts_sent: total_parts,
            response: None,
        })
    }

    /// Registers `device` for `user` and returns the session holding the
    /// encryption key the server issued.
    pub async fn register(
        &self,
        user: &str,
        organisation: &str,
        password: &str,
        device: &str,
        preferred_encryption_scheme: EncryptionScheme,
    ) -> Result<Session> {
        let translator = MessageTranslator::new(user, organisation, device);
        let request = RegisterRequest {
            user: user.to_string(),
            organisation: organisation.to_string(),
            password: password.to_string(),
            device: device.to_string(),
            preferred_encryption_scheme,
        };
        let message = translator.to_message(&request, None)?;
        let report = self.send(&message).await?;

        let Some(response) = report.response else {
            return Err(MessagingError::TransportFailure(format!(
                "No response was returned for the registration request ({})",
                message.id
            )));
        };
        let data: RegisterResponse = translator.from_message(&response)?;

        if data.code != RegisterResponse::ERROR_CODE_SUCCESS {
            return Err(MessagingError::ProcessingFailed {
                message_id: message.id,
                detail: data.detail,
            });
        }

        info!(
            "Registered the device ({device}) for the user ({user}) using the encryption scheme ({})",
            data.encryption_scheme
        );
        Ok(Session {
            user: user.to_string(),
            organisation: organisation.to_string(),
            device: device.to_string(),
            encryption_scheme: data.encryption_scheme,
            encryption_key: data.user_encryption_key,
        })
    }

    /// Authenticates an already registered `device` and returns a session
    /// holding its key.
    pub async fn authenticate(
        &self,
        user: &str,
        organisation: &str,
        password: &str,
        device: &str,
        preferred_encryption_scheme: EncryptionScheme,
    ) -> Result<Session> {
        let translator = MessageTranslator::new(user, organisation, device);
        let request = AuthenticateRequest {
            user: user.to_string(),
            organisation: organisation.to_string(),
            password: password.to_string(),
            device: device.to_string(),
            preferred_encryption_scheme,
        };
        let message = translator.to_message(&request, None)?;
        let report = self.send(&message).await?;

        let Some(response) = report.response else {
            return Err(MessagingError::TransportFailure(format!(
                "No response was returned for the authentication request ({})",
                message.id
            )));
        };
        let data: AuthenticateResponse = translator.from_message(&response)?;

        if data.code != AuthenticateResponse::ERROR_CODE_SUCCESS {
            return Err(MessagingError::ProcessingFailed {
                message_id: message.id,
                detail: data.detail,
            });
        }

        info!("Authenticated the device ({device}) for the user ({user})");
        Ok(Session {
            user: user.to_string(),
            organisation: organisation.to_string(),
            device: device.to_string(),
            encryption_scheme: data.encryption_scheme,
            encryption_key: data.user_encryption_key,
        })
    }

    async fn fetch_messages(
        &self,
        device: &str,
        user: &str,
        encryption_scheme: EncryptionScheme,
    ) -> Result<Vec<Message>> {
        let request = Envelope::MessageDownloadRequest(MessageDownloadRequest {
            device: device.to_string(),
            user: user.to_string(),
            encryption_scheme,
        });
        let reply = self.exchange(&request).await?;
        let Envelope::MessageDownloadResponse(response) = reply else {
            return Err(Self::unexpected(&reply));
        };
        Self::check(
            response.code,
            &response.detail,
            format!("Downloading the messages for the device ({device})"),
        )?;
        Ok(response.messages)
    }

    async fn acknowledge_message(&self, device: &str, message_id: Uuid) -> Result<()> {
        let request = Envelope::MessageReceivedRequest(MessageReceivedRequest {
            device: device.to_string(),
            message_id,
        });
        let reply = self.exchange(&request).await?;
        let Envelope::MessageReceivedResponse(response) = reply else {
            return Err(Self::unexpected(&reply));
        };
        Self::check(
            response.code,
            &response.detail,
            format!("Acknowledging the message ({message_id})"),
        )
    }

    async fn fetch_message_parts(&self, device: &str) -> Result<Vec<MessagePart>> {
        let request = Envelope::MessagePartDownloadRequest(MessagePartDownloadRequest {
            device: device.to_string(),
        });
        let reply = self.exchange(&request).await?;
        let Envelope::MessagePartDownloadResponse(response) = reply else {
            return Err(Self::unexpected(&reply));
        };
        Self::check(
            response.code,
            &response.detail,
            format!("Downloading the message parts for the device ({device})"),
        )?;
        Ok(response.parts)
    }

    async fn acknowledge_message_part(&self, device: &str, message_part_id: Uuid) -> Result<()> {
        let request = Envelope::MessagePartReceivedRequest(MessagePartReceivedRequest {
            device: device.to_string(),
            message_part_id,
        });
        let reply = self.exchange(&request).await?;
        let Envelope::MessagePartReceivedResponse(response) = reply else {
            return Err(Self::unexpected(&reply));
        };
        Self::check(
            response.code,
            &response.detail,
            format!("Acknowledging the message part ({message_part_id})"),
        )
    }

    /// Downloads the messages queued for `device` and `user`, passing each
    /// to `handler` and acknowledging it once the handler succeeds.
    ///
    /// A handler error stops the loop and the message stays queued on the
    /// server. Returns the number of messages handled.
    pub async fn download_messages<H>(
        &self,
        device: &str,
        user: &str,
        encryption_scheme: EncryptionScheme,
        policy: PollPolicy,
        mut handler: H,
    ) -> Result<usize>
    where
        H: FnMut(Message) -> Result<()>,
    {
        let mut poller = DownloadPoller::new(
            || self.fetch_messages(device, user, encryption_scheme),
            policy,
        );

        let mut handled = 0;
        while let Some(page) = poller.next_page().await? {
            for message in page {
                let message_id = message.id;
                handler(message)?;
                self.acknowledge_message(device, message_id).await?;
                handled += 1;
            }
        }

        debug!("Downloaded {handled} messages for the device ({device})");
        Ok(handled)
    }

    /// Downloads the message parts queued for `device`, feeding them to
    /// `assembler` and passing every completed message to `handler`.
    /// Returns the number of messages handled.
    pub async fn download_message_parts<H>(
        &self,
        device: &str,
        policy: PollPolicy,
        assembler: &mut PartAssembler,
        mut handler: H,
    ) -> Result<usize>
    where
        H: FnMut(Message) -> Result<()>,
    {
        let mut poller = DownloadPoller::new(|| self.fetch_message_parts(device), policy);

        let mut handled = 0;
        while let Some(page) = poller.next_page().await? {
            for part in page {
                let part_id = part.id;
                if let Some(result) = assembler.add(part) {
                    handler(result?)?;
                    handled += 1;
                }
                self.acknowledge_message_part(device, part_id).await?;
            }
        }

        debug!("Assembled {handled} messages from parts for the device ({device})");
        Ok(handled)
    }
}

impl std::fmt::Debug for MessagingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
