mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AuthSettings, ClientSettings, DEFAULT_MASTER_KEY, LogSettings, MessagingSettings,
    ServerSettings, Settings,
};

/// Loads the configuration from `config/default` and `COURIER__*` environment
/// variables, then merges whatever was found over `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("COURIER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let default = Settings::default();
    let server = partial.server;
    let messaging = partial.messaging;
    let client = partial.client;

    Ok(Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            instance_name: server
                .as_ref()
                .and_then(|s| s.instance_name.clone())
                .unwrap_or(default.server.instance_name),
        },
        messaging: MessagingSettings {
            max_async_message_size: messaging
                .as_ref()
                .and_then(|m| m.max_async_message_size)
                .unwrap_or(default.messaging.max_async_message_size),
            max_message_part_size: messaging
                .as_ref()
                .and_then(|m| m.max_message_part_size)
                .unwrap_or(default.messaging.max_message_part_size),
            maximum_processing_attempts: messaging
                .as_ref()
                .and_then(|m| m.maximum_processing_attempts)
                .unwrap_or(default.messaging.maximum_processing_attempts),
            processing_retry_delay_ms: messaging
                .as_ref()
                .and_then(|m| m.processing_retry_delay_ms)
                .unwrap_or(default.messaging.processing_retry_delay_ms),
            download_batch_size: messaging
                .as_ref()
                .and_then(|m| m.download_batch_size)
                .unwrap_or(default.messaging.download_batch_size),
            archive_retention_secs: messaging
                .as_ref()
                .and_then(|m| m.archive_retention_secs)
                .unwrap_or(default.messaging.archive_retention_secs),
            master_key: messaging
                .as_ref()
                .and_then(|m| m.master_key.clone())
                .unwrap_or(default.messaging.master_key),
            database_path: messaging
                .as_ref()
                .and_then(|m| m.database_path.clone())
                .unwrap_or(default.messaging.database_path),
        },
        client: ClientSettings {
            endpoint: client
                .as_ref()
                .and_then(|c| c.endpoint.clone())
                .unwrap_or(default.client.endpoint),
            timeout_secs: client
                .as_ref()
                .and_then(|c| c.timeout_secs)
                .unwrap_or(default.client.timeout_secs),
        },
        auth: AuthSettings {
            users: partial
                .auth
                .and_then(|a| a.users)
                .unwrap_or(default.auth.users),
        },
        log: LogSettings {
            level: partial
                .log
                .and_then(|l| l.level)
                .unwrap_or(default.log.level),
        },
    })
}
