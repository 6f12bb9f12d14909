//! Typed payloads and their conversion to and from `Message` envelopes.

pub mod payloads;
pub mod registry;
#[allow(clippy::module_inception)]
pub mod translator;

pub use payloads::{
    AnotherTestRequest, AnotherTestResponse, AuthenticateRequest, AuthenticateResponse,
    CheckUserExistsRequest, CheckUserExistsResponse,
    MessageData, MessagePartDownloadTestRequest, MessagePartDownloadTestResponse, Payload,
    RegisterRequest, RegisterResponse, SubmitErrorReportRequest, SubmitErrorReportResponse,
};
pub use registry::PayloadRegistry;
pub use translator::MessageTranslator;

#[cfg(test)]
mod tests;
