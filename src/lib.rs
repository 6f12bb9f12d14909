//! # Courier
//!
//! `courier` is a store-and-forward messaging layer between devices and a
//! server. Devices post binary envelopes over HTTP; the server verifies and
//! decrypts them, dispatches them to handlers synchronously or through a
//! persistent queue with bounded retry, and stages responses for the device
//! to download.
//!
//! ## Core Modules
//!
//! - `message`: the `Message` and `MessagePart` records and their states.
//! - `crypto`: AES-CFB encryption, data hashes and per-device key derivation.
//! - `chunking`: splitting large messages into parts and reassembling them.
//! - `translator`: typed payloads to and from `Message` envelopes.
//! - `codec`: the wire documents and their binary encoding.
//! - `persistence`: the sled-backed message repository.
//! - `server`: the dispatch queue, handlers and the background processor.
//! - `transport`: the axum endpoint and the device-side client.
//! - `config`: loading settings from files and the environment.
//! - `utils`: the error taxonomy and logging.

pub mod chunking;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod message;
pub mod persistence;
pub mod server;
pub mod translator;
pub mod transport;
pub mod utils;
