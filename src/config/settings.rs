use serde::Deserialize;
use std::collections::HashMap;

/// Development-only master key used to derive the per-user/device encryption
/// keys when no key has been configured.
pub const DEFAULT_MASTER_KEY: &str = "Ev5UOwzqSEoSsqbyCVn6q9LZHhhkbXZndDgyOGQyMjY=";

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub messaging: MessagingSettings,
    pub client: ClientSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
}

/// Configuration settings for the HTTP server.
///
/// `instance_name` is used as the lock name when the background processor
/// claims queued messages.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub instance_name: String,
}

/// Transport and dispatch queue limits.
#[derive(Debug, Deserialize, Clone)]
pub struct MessagingSettings {
    pub max_async_message_size: usize,
    pub max_message_part_size: usize,
    pub maximum_processing_attempts: u32,
    pub processing_retry_delay_ms: u64,
    pub download_batch_size: usize,
    /// How long processed messages stay in the archive.
    pub archive_retention_secs: u64,
    pub master_key: String,
    pub database_path: String,
}

/// Settings used by the device-side transport client.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub endpoint: String,
    pub timeout_secs: u64,
}

/// Credentials accepted by the registration handshake, keyed by username.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthSettings {
    pub users: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub messaging: Option<PartialMessagingSettings>,
    pub client: Option<PartialClientSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub instance_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialMessagingSettings {
    pub max_async_message_size: Option<usize>,
    pub max_message_part_size: Option<usize>,
    pub maximum_processing_attempts: Option<u32>,
    pub processing_retry_delay_ms: Option<u64>,
    pub download_batch_size: Option<usize>,
    pub archive_retention_secs: Option<u64>,
    pub master_key: Option<String>,
    pub database_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialClientSettings {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialAuthSettings {
    pub users: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            max_async_message_size: 40960,
            max_message_part_size: 40960,
            maximum_processing_attempts: 3,
            processing_retry_delay_ms: 5000,
            download_batch_size: 3,
            archive_retention_secs: 7 * 24 * 60 * 60,
            master_key: DEFAULT_MASTER_KEY.to_string(),
            database_path: "courier_db".to_string(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/messaging".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        let mut users = HashMap::new();
        users.insert("admin".to_string(), "password".to_string());

        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                instance_name: "courier".to_string(),
            },
            messaging: MessagingSettings::default(),
            client: ClientSettings::default(),
            auth: AuthSettings { users },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
