use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;

use super::*;
use crate::chunking::PartAssembler;
use crate::codec::CONTENT_TYPE;
use crate::config::Settings;
use crate::message::{EncryptionScheme, Message};
use crate::server::{BackgroundMessageProcessor, MessagingService};
use crate::translator::{
    AnotherTestRequest, AnotherTestResponse, MessagePartDownloadTestRequest,
    MessagePartDownloadTestResponse, MessageTranslator,
};
use crate::utils::MessagingError;

const USER: &str = "admin";
const ORGANISATION: &str = "acme";
const DEVICE: &str = "device-1";

struct Loopback {
    _dir: TempDir,
    service: Arc<MessagingService>,
    endpoint: String,
}

async fn start_server() -> Loopback {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.messaging.database_path = dir.path().join("db").to_str().unwrap().to_string();
    settings.messaging.processing_retry_delay_ms = 0;
    let service = Arc::new(MessagingService::from_settings(&settings).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(service.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Loopback {
        _dir: dir,
        service,
        endpoint: format!("http://{addr}{MESSAGING_PATH}"),
    }
}

fn client(endpoint: &str) -> MessagingClient {
    MessagingClient::new(endpoint, Duration::from_secs(10), 40960, 40960).unwrap()
}

fn plain() -> MessageTranslator {
    MessageTranslator::new(USER, ORGANISATION, DEVICE)
}

fn echo(value: &str, size: usize) -> AnotherTestRequest {
    AnotherTestRequest {
        test_value: value.to_string(),
        test_data: vec![7u8; size],
    }
}

fn drain(service: &MessagingService) -> usize {
    BackgroundMessageProcessor::drain(service)
}

#[tokio::test]
async fn test_register_returns_a_session() {
    let server = start_server().await;
    let client = client(&server.endpoint);

    let session = client
        .register(USER, ORGANISATION, "password", DEVICE, EncryptionScheme::AesCfb)
        .await
        .unwrap();

    assert_eq!(session.encryption_scheme, EncryptionScheme::AesCfb);
    assert_eq!(session.encryption_key.len(), 32);
    assert_eq!(session.device, DEVICE);
}

#[tokio::test]
async fn test_register_with_wrong_password_fails() {
    let server = start_server().await;
    let client = client(&server.endpoint);

    let err = client
        .register(USER, ORGANISATION, "wrong", DEVICE, EncryptionScheme::AesCfb)
        .await
        .unwrap_err();

    assert!(matches!(err, MessagingError::ProcessingFailed { .. }));
}

#[tokio::test]
async fn test_authenticate_returns_the_registered_key() {
    let server = start_server().await;
    let client = client(&server.endpoint);
    let registered = client
        .register(USER, ORGANISATION, "password", DEVICE, EncryptionScheme::AesCfb)
        .await
        .unwrap();

    let session = client
        .authenticate(USER, ORGANISATION, "password", DEVICE, EncryptionScheme::AesCfb)
        .await
        .unwrap();
    assert_eq!(session.encryption_key, registered.encryption_key);

    let err = client
        .authenticate(USER, ORGANISATION, "wrong", DEVICE, EncryptionScheme::AesCfb)
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::ProcessingFailed { .. }));
}

#[tokio::test]
async fn test_small_message_is_sent_whole() {
    let server = start_server().await;
    let client = client(&server.endpoint);
    let request = plain().to_message(&echo("hello", 16), None).unwrap();

    let report = client.send(&request).await.unwrap();

    assert_eq!(report.state, SendState::SentWhole);
    assert_eq!(report.parts_sent, 0);
    assert!(report.response.is_none());
    assert_eq!(drain(&server.service), 1);
}

#[tokio::test]
async fn test_large_encrypted_message_is_sent_in_parts() {
    let server = start_server().await;
    let setup = client(&server.endpoint);
    let session = setup
        .register(USER, ORGANISATION, "password", DEVICE, EncryptionScheme::AesCfb)
        .await
        .unwrap();

    let small = MessagingClient::new(&server.endpoint, Duration::from_secs(10), 256, 128).unwrap();
    let device = session.translator();
    let request = device.to_message(&echo("big", 300), None).unwrap();
    assert!(request.is_encrypted());

    let report = small.send(&request).await.unwrap();
    assert_eq!(report.state, SendState::AllPartsAcked);
    assert!(report.parts_sent > 1);

    assert_eq!(drain(&server.service), 1);

    let mut received = Vec::new();
    let handled = small
        .download_messages(
            DEVICE,
            USER,
            session.encryption_scheme,
            PollPolicy::default(),
            |message| {
                received.push(message);
                Ok(())
            },
        )
        .await
        .unwrap();

    assert_eq!(handled, 1);
    assert_eq!(received[0].correlation_id, Some(request.id));
    let response: AnotherTestResponse = device.from_message(&received[0]).unwrap();
    assert_eq!(response.test_value, "big");
    assert_eq!(response.test_data.len(), 300);
}

#[tokio::test]
async fn test_download_acknowledges_and_stops_on_empty_page() {
    let server = start_server().await;
    let client = client(&server.endpoint);

    let handled = client
        .download_messages(DEVICE, USER, EncryptionScheme::None, PollPolicy::default(), |_| Ok(()))
        .await
        .unwrap();
    assert_eq!(handled, 0);

    for value in ["a", "b"] {
        let request = plain().to_message(&echo(value, 4), None).unwrap();
        client.send(&request).await.unwrap();
    }
    assert_eq!(drain(&server.service), 2);

    let mut values = Vec::new();
    let handled = client
        .download_messages(DEVICE, USER, EncryptionScheme::None, PollPolicy::default(), |m| {
            let response: AnotherTestResponse = plain().from_message(&m)?;
            values.push(response.test_value);
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(handled, 2);
    values.sort();
    assert_eq!(values, vec!["a".to_string(), "b".to_string()]);

    let handled = client
        .download_messages(DEVICE, USER, EncryptionScheme::None, PollPolicy::default(), |_| Ok(()))
        .await
        .unwrap();
    assert_eq!(handled, 0);
}

#[tokio::test]
async fn test_handler_error_leaves_the_message_queued() {
    let server = start_server().await;
    let client = client(&server.endpoint);
    let request = plain().to_message(&echo("retry", 4), None).unwrap();
    client.send(&request).await.unwrap();
    drain(&server.service);

    let err = client
        .download_messages(DEVICE, USER, EncryptionScheme::None, PollPolicy::default(), |_| {
            Err(MessagingError::InvalidInput("not now".to_string()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::InvalidInput(_)));

    let handled = client
        .download_messages(DEVICE, USER, EncryptionScheme::None, PollPolicy::default(), |_| Ok(()))
        .await
        .unwrap();
    assert_eq!(handled, 1);
}

#[tokio::test]
async fn test_large_response_is_downloaded_as_parts() {
    let server = start_server().await;
    let client = client(&server.endpoint);
    let request = plain()
        .to_message(&MessagePartDownloadTestRequest::default(), None)
        .unwrap();
    client.send(&request).await.unwrap();
    drain(&server.service);

    let mut assembler = PartAssembler::new();
    let mut assembled = Vec::new();
    let handled = client
        .download_message_parts(DEVICE, PollPolicy::default(), &mut assembler, |message| {
            assembled.push(message);
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(handled, 1);
    assert_eq!(assembler.pending_messages(), 0);
    assert_eq!(assembled[0].correlation_id, Some(request.id));
    let response: MessagePartDownloadTestResponse = plain().from_message(&assembled[0]).unwrap();
    assert_eq!(response.test_data.len(), 128 * 1024);

    let handled = client
        .download_message_parts(DEVICE, PollPolicy::default(), &mut assembler, |_| Ok(()))
        .await
        .unwrap();
    assert_eq!(handled, 0);
}

#[tokio::test]
async fn test_unknown_type_is_a_transport_failure() {
    let server = start_server().await;
    let client = client(&server.endpoint);
    let request = Message::new(USER, ORGANISATION, DEVICE, "unknown", 1, None, 5, b"{}".to_vec());

    let err = client.send(&request).await.unwrap_err();

    assert!(matches!(err, MessagingError::TransportFailure(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{addr}{MESSAGING_PATH}"));
    let request = plain().to_message(&echo("x", 1), None).unwrap();

    let err = client.send(&request).await.unwrap_err();

    assert!(matches!(err, MessagingError::TransportFailure(_)));
}

#[tokio::test]
async fn test_undecodable_body_is_a_bad_request() {
    let server = start_server().await;

    let response = reqwest::Client::new()
        .post(&server.endpoint)
        .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
        .body(vec![0xffu8; 3])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_poller_stops_at_the_page_limit() {
    let mut poller = DownloadPoller::new(
        || std::future::ready(Ok::<_, MessagingError>(vec![1u8])),
        PollPolicy::default().with_max_pages(2),
    );

    assert!(poller.next_page().await.unwrap().is_some());
    assert!(poller.next_page().await.unwrap().is_some());
    assert!(poller.next_page().await.unwrap().is_none());
    assert_eq!(poller.pages(), 2);
}

#[tokio::test]
async fn test_poller_stops_at_the_deadline() {
    let mut poller = DownloadPoller::new(
        || std::future::ready(Ok::<_, MessagingError>(vec![1u8])),
        PollPolicy::default().with_deadline(Duration::ZERO),
    );

    assert!(poller.next_page().await.unwrap().is_none());
    assert_eq!(poller.pages(), 0);
}

#[tokio::test]
async fn test_poller_stops_on_an_empty_page() {
    let mut pages = vec![vec![], vec![2u8], vec![1u8]];
    let mut poller = DownloadPoller::new(
        || std::future::ready(Ok::<_, MessagingError>(pages.pop().unwrap_or_default())),
        PollPolicy::default(),
    );

    assert_eq!(poller.next_page().await.unwrap(), Some(vec![1u8]));
    assert_eq!(poller.next_page().await.unwrap(), Some(vec![2u8]));
    assert_eq!(poller.next_page().await.unwrap(), None);
    assert_eq!(poller.next_page().await.unwrap(), None);
}
