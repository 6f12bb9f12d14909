//! CLI for Courier
//!
//! Subcommands:
//! - `server`: run the messaging endpoint and the background processor
//! - `client`: register a device, send a test message and download the reply

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use courier::config::{Settings, load_config};
use courier::message::EncryptionScheme;
use courier::server::{BackgroundMessageProcessor, MessagingService};
use courier::translator::{AnotherTestRequest, AnotherTestResponse};
use courier::transport::{MessagingClient, PollPolicy, start_http_server};
use courier::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "courier")]
enum Command {
    /// Start the messaging server
    Server,
    /// Run the example device client against a running server
    Client {
        /// Messaging endpoint to post to (defaults to the configured endpoint)
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long, default_value = "admin")]
        user: String,
        #[arg(long, default_value = "password")]
        password: String,
        #[arg(long, default_value = "acme")]
        organisation: String,
        #[arg(long, default_value = "courier-cli")]
        device: String,
        /// How long to keep polling for the reply
        #[arg(long, default_value_t = 10)]
        wait_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cmd = Command::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return;
        }
    };
    logging::init(&config.log.level);

    match cmd {
        Command::Server => {
            if let Err(e) = run_server(config).await {
                error!("Server failed: {}", e);
            }
        }
        Command::Client {
            endpoint,
            user,
            password,
            organisation,
            device,
            wait_secs,
        } => {
            let mut config = config;
            if let Some(endpoint) = endpoint {
                config.client.endpoint = endpoint;
            }
            let login = Login {
                user,
                password,
                organisation,
                device,
            };
            if let Err(e) = run_client(&config, &login, Duration::from_secs(wait_secs)).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn run_server(config: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let service = Arc::new(MessagingService::from_settings(&config)?);

    let processor = BackgroundMessageProcessor::new(service.clone(), Duration::from_secs(1));
    tokio::spawn(processor.run());

    tokio::select! {
        result = start_http_server(&addr, service) => {
            result?;
            error!("HTTP server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

struct Login {
    user: String,
    password: String,
    organisation: String,
    device: String,
}

async fn run_client(
    config: &Settings,
    login: &Login,
    wait: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = MessagingClient::from_settings(config)?;

    // 1. Register and receive the device key
    let session = client
        .register(
            &login.user,
            &login.organisation,
            &login.password,
            &login.device,
            EncryptionScheme::AesCfb,
        )
        .await?;
    println!("Registered {:?}", session);

    // 2. Send an encrypted test request
    let translator = session.translator();
    let request = AnotherTestRequest {
        test_value: "Hello from courier".to_string(),
        test_data: b"ping".to_vec(),
    };
    let message = translator.to_message(&request, None)?;
    let report = client.send(&message).await?;
    println!("Sent {} ({:?})", report.message_id, report.state);

    // 3. Poll for the reply until it arrives or the wait runs out
    let deadline = tokio::time::Instant::now() + wait;
    while tokio::time::Instant::now() < deadline {
        let received = client
            .download_messages(
                &session.device,
                &session.user,
                session.encryption_scheme,
                PollPolicy::default().with_deadline(wait),
                |reply| {
                    let response: AnotherTestResponse = translator.from_message(&reply)?;
                    println!(
                        "Reply to {:?}: {} ({} bytes)",
                        reply.correlation_id,
                        response.test_value,
                        response.test_data.len()
                    );
                    Ok(())
                },
            )
            .await?;
        if received > 0 {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    println!("No reply arrived within {:?}", wait);
    Ok(())
}
