use std::collections::HashMap;

use super::payloads::{
    AnotherTestRequest, AnotherTestResponse, AuthenticateRequest, AuthenticateResponse,
    CheckUserExistsRequest, CheckUserExistsResponse,
    MessageData, MessagePartDownloadTestRequest, MessagePartDownloadTestResponse, Payload,
    RegisterRequest, RegisterResponse, SubmitErrorReportRequest, SubmitErrorReportResponse,
};
use crate::message::MessageTypeKey;

type DecodeFn = fn(&[u8]) -> serde_json::Result<Payload>;

fn decode_as<T>(data: &[u8]) -> serde_json::Result<Payload>
where
    T: MessageData + Into<Payload>,
{
    serde_json::from_slice::<T>(data).map(Into::into)
}

/// Maps `(type, version)` to the decoder for that payload.
#[derive(Debug, Clone, Default)]
pub struct PayloadRegistry {
    decoders: HashMap<MessageTypeKey, DecodeFn>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every system payload, requests and responses.
    pub fn with_system_payloads() -> Self {
        let mut registry = Self::new();
        registry.register::<RegisterRequest>();
        registry.register::<RegisterResponse>();
        registry.register::<AuthenticateRequest>();
        registry.register::<AuthenticateResponse>();
        registry.register::<CheckUserExistsRequest>();
        registry.register::<CheckUserExistsResponse>();
        registry.register::<AnotherTestRequest>();
        registry.register::<AnotherTestResponse>();
        registry.register::<MessagePartDownloadTestRequest>();
        registry.register::<MessagePartDownloadTestResponse>();
        registry.register::<SubmitErrorReportRequest>();
        registry.register::<SubmitErrorReportResponse>();
        registry
    }

    pub fn register<T>(&mut self)
    where
        T: MessageData + Into<Payload>,
    {
        self.decoders.insert(T::type_key(), decode_as::<T>);
    }

    pub fn contains(&self, key: &MessageTypeKey) -> bool {
        self.decoders.contains_key(key)
    }

    /// Decodes `data` with the decoder registered for `key`, if any.
    pub fn decode(&self, key: &MessageTypeKey, data: &[u8]) -> Option<serde_json::Result<Payload>> {
        self.decoders.get(key).map(|decode| decode(data))
    }
}
