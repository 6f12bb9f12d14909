use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::codec::{
    self, BincodeCodec, ERROR_INVALID_REQUEST, ERROR_PROCESSING_FAILED, ERROR_QUEUEING_FAILED,
    ERROR_UNKNOWN, ERROR_UNRECOGNISED_TYPE, Envelope, EnvelopeCodec, EnvelopeKind,
    MessageDownloadResponse, MessagePartDownloadResponse, MessagePartReceivedResponse,
    MessagePartResult, MessageReceivedResponse, MessageResult, SUCCESS,
};
use crate::server::MessagingService;
use crate::utils::{MessagingError, Result};

pub const MESSAGING_PATH: &str = "/messaging";

#[derive(Clone)]
struct HttpState {
    service: Arc<MessagingService>,
    codec: Arc<dyn EnvelopeCodec>,
}

/// The result code reported to a device for `error`.
pub fn result_code(error: &MessagingError) -> i32 {
    match error {
        MessagingError::UnknownType { .. } => ERROR_UNRECOGNISED_TYPE,
        MessagingError::InvalidInput(_)
        | MessagingError::IncompleteSet { .. }
        | MessagingError::DuplicatePart { .. }
        | MessagingError::ChecksumMismatch { .. }
        | MessagingError::IntegrityError { .. }
        | MessagingError::DecryptionError(_) => ERROR_INVALID_REQUEST,
        MessagingError::Storage(_) => ERROR_QUEUEING_FAILED,
        MessagingError::ProcessingFailed { .. } | MessagingError::Fatal { .. } => {
            ERROR_PROCESSING_FAILED
        }
        _ => ERROR_UNKNOWN,
    }
}

pub fn router(service: Arc<MessagingService>) -> Router {
    router_with_codec(service, Arc::new(BincodeCodec))
}

pub fn router_with_codec(service: Arc<MessagingService>, codec: Arc<dyn EnvelopeCodec>) -> Router {
    Router::new()
        .route(MESSAGING_PATH, post(handle_messaging))
        .with_state(HttpState { service, codec })
}

pub async fn start_http_server(addr: &str, service: Arc<MessagingService>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Messaging server listening on http://{addr}{MESSAGING_PATH}");
    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn handle_messaging(State(state): State<HttpState>, body: Bytes) -> Response {
    let request = match state.codec.decode(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Failed to decode a request of {} bytes: {e}", body.len());
            return (StatusCode::BAD_REQUEST, format!("Invalid request: {e}")).into_response();
        }
    };

    let kind = request.kind();
    let service = state.service.clone();
    let valid = state.codec.is_valid_document(&request, kind);
    let reply = tokio::task::spawn_blocking(move || {
        if valid {
            dispatch(&service, request)
        } else {
            rejected(kind, ERROR_INVALID_REQUEST, "the request is missing required fields")
        }
    })
    .await;

    let reply = match reply {
        Ok(Some(envelope)) => envelope,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("{kind:?} is not a request document"),
            )
                .into_response();
        }
        Err(e) => {
            error!("Failed to handle a {kind:?} request: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match state.codec.encode(&reply) {
        Ok(bytes) => ([(header::CONTENT_TYPE, codec::CONTENT_TYPE)], bytes).into_response(),
        Err(e) => {
            error!("Failed to encode the {:?} reply: {e}", reply.kind());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// The reply to a request document that could not be handled, or `None`
/// when `kind` is not a request at all.
fn rejected(kind: EnvelopeKind, code: i32, detail: &str) -> Option<Envelope> {
    let detail = detail.to_string();
    let reply = match kind {
        EnvelopeKind::Message => Envelope::MessageResult(MessageResult {
            code,
            detail,
            message: None,
        }),
        EnvelopeKind::MessagePart => {
            Envelope::MessagePartResult(MessagePartResult { code, detail })
        }
        EnvelopeKind::MessageDownloadRequest => {
            Envelope::MessageDownloadResponse(MessageDownloadResponse {
                code,
                detail,
                messages: Vec::new(),
            })
        }
        EnvelopeKind::MessageReceivedRequest => {
            Envelope::MessageReceivedResponse(MessageReceivedResponse { code, detail })
        }
        EnvelopeKind::MessagePartDownloadRequest => {
            Envelope::MessagePartDownloadResponse(MessagePartDownloadResponse {
                code,
                detail,
                parts: Vec::new(),
            })
        }
        EnvelopeKind::MessagePartReceivedRequest => {
            Envelope::MessagePartReceivedResponse(MessagePartReceivedResponse { code, detail })
        }
        _ => return None,
    };
    Some(reply)
}

fn failed(kind: EnvelopeKind, error: &MessagingError) -> Option<Envelope> {
    warn!("Failed to handle a {kind:?} request: {error}");
    rejected(kind, result_code(error), &error.to_string())
}

fn dispatch(service: &MessagingService, request: Envelope) -> Option<Envelope> {
    let kind = request.kind();
    debug!("Handling a {kind:?} request");

    let reply = match request {
        Envelope::Message(message) => match service.process_message(message) {
            Ok(response) => Envelope::MessageResult(MessageResult {
                code: SUCCESS,
                detail: String::new(),
                message: response,
            }),
            Err(e) => return failed(kind, &e),
        },
        Envelope::MessagePart(part) => match service.queue_message_part_for_assembly(part) {
            Ok(()) => Envelope::MessagePartResult(MessagePartResult {
                code: SUCCESS,
                detail: String::new(),
            }),
            Err(e) => return failed(kind, &e),
        },
        Envelope::MessageDownloadRequest(request) => match service.messages_queued_for_download(
            &request.device,
            &request.user,
            request.encryption_scheme,
        ) {
            Ok(messages) => Envelope::MessageDownloadResponse(MessageDownloadResponse {
                code: SUCCESS,
                detail: String::new(),
                messages,
            }),
            Err(e) => return failed(kind, &e),
        },
        Envelope::MessageReceivedRequest(request) => {
            match service.message_downloaded(&request.device, &request.message_id) {
                Ok(()) => Envelope::MessageReceivedResponse(MessageReceivedResponse {
                    code: SUCCESS,
                    detail: String::new(),
                }),
                Err(e) => return failed(kind, &e),
            }
        }
        Envelope::MessagePartDownloadRequest(request) => {
            match service.message_parts_queued_for_download(&request.device) {
                Ok(parts) => Envelope::MessagePartDownloadResponse(MessagePartDownloadResponse {
                    code: SUCCESS,
                    detail: String::new(),
                    parts,
                }),
                Err(e) => return failed(kind, &e),
            }
        }
        Envelope::MessagePartReceivedRequest(request) => {
            match service.message_part_downloaded(&request.device, &request.message_part_id) {
                Ok(()) => Envelope::MessagePartReceivedResponse(MessagePartReceivedResponse {
                    code: SUCCESS,
                    detail: String::new(),
                }),
                Err(e) => return failed(kind, &e),
            }
        }
        _ => return None,
    };

    Some(reply)
}
