//! The server dispatch queue.
//!
//! - `service`: `MessagingService`, which processes, queues and hands out
//!   messages and parts for download.
//! - `handler`: the `MessageHandler` seam and the built-in
//!   `SystemMessageHandler`.
//! - `processor`: the background worker that retries failed asynchronous
//!   messages up to the configured number of attempts.
//! - `auth`: credential checks for the registration handshake.

pub mod auth;
pub mod handler;
pub mod processor;
pub mod service;

pub use auth::{AuthError, Authenticator, ConfigAuthenticator};
pub use handler::{HandlerError, MessageHandler, ProcessingMode, SystemMessageHandler};
pub use processor::BackgroundMessageProcessor;
pub use service::MessagingService;
