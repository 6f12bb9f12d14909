//! HTTP transport between devices and the server.
//!
//! Every document travels as a binary `Envelope` posted to `/messaging`.
//! The `http` side exposes a `MessagingService` through axum; the `client`
//! side is what a device uses to send messages, register and download what
//! the server has queued for it.

pub mod client;
pub mod http;
pub mod poller;

pub use client::{MessagingClient, SendReport, SendState, Session};
pub use http::{MESSAGING_PATH, result_code, router, router_with_codec, start_http_server};
pub use poller::{DownloadPoller, PollPolicy};

#[cfg(test)]
mod tests;
