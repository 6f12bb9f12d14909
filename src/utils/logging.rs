use tracing_subscriber::EnvFilter;

/// The directive used for `level`, which falls back to `info` for anything
/// unrecognised. Chatty dependencies are held at `warn`.
pub fn directive(level: &str) -> String {
    let level = match level.to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };
    format!("{level},sled=warn,hyper=warn,reqwest=warn")
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured `level` when it is set. Uses
/// `try_init` so tests and the binary can both call this without panicking.
pub fn init(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
