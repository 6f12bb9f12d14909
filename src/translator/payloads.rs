use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{EncryptionScheme, MessageTypeKey, Priority};

/// A typed payload that can travel as the `data` of a `Message`.
///
/// The `(MESSAGE_TYPE, MESSAGE_TYPE_VERSION)` pair is what receivers use to
/// pick the decoder for the payload.
pub trait MessageData: Serialize + DeserializeOwned {
    const MESSAGE_TYPE: &'static str;
    const MESSAGE_TYPE_VERSION: u32;
    const MESSAGE_TYPE_PRIORITY: Priority;

    fn type_key() -> MessageTypeKey {
        MessageTypeKey::new(Self::MESSAGE_TYPE, Self::MESSAGE_TYPE_VERSION)
    }
}

macro_rules! message_data {
    ($ty:ident, $id:literal, $version:literal, $priority:expr) => {
        impl MessageData for $ty {
            const MESSAGE_TYPE: &'static str = $id;
            const MESSAGE_TYPE_VERSION: u32 = $version;
            const MESSAGE_TYPE_PRIORITY: Priority = $priority;
        }

        impl From<$ty> for Payload {
            fn from(data: $ty) -> Self {
                Payload::$ty(data)
            }
        }
    };
}

/// Registers a device for a user and asks for the device's encryption key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub user: String,
    pub organisation: String,
    pub password: String,
    pub device: String,
    pub preferred_encryption_scheme: EncryptionScheme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub code: i32,
    pub detail: String,
    pub encryption_scheme: EncryptionScheme,
    pub user_encryption_key: Vec<u8>,
}

impl RegisterResponse {
    pub const ERROR_CODE_SUCCESS: i32 = 0;
    pub const ERROR_CODE_UNKNOWN_ERROR: i32 = -1;
    pub const ERROR_CODE_AUTHENTICATION_FAILED: i32 = 1;

    pub fn success(encryption_scheme: EncryptionScheme, user_encryption_key: Vec<u8>) -> Self {
        Self {
            code: Self::ERROR_CODE_SUCCESS,
            detail: "Success".to_string(),
            encryption_scheme,
            user_encryption_key,
        }
    }

    pub fn failure(code: i32, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
            encryption_scheme: EncryptionScheme::None,
            user_encryption_key: Vec::new(),
        }
    }
}

/// Re-authenticates an already registered device and asks for its
/// encryption key again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    pub user: String,
    pub organisation: String,
    pub password: String,
    pub device: String,
    pub preferred_encryption_scheme: EncryptionScheme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    pub code: i32,
    pub detail: String,
    pub encryption_scheme: EncryptionScheme,
    pub user_encryption_key: Vec<u8>,
}

impl AuthenticateResponse {
    pub const ERROR_CODE_SUCCESS: i32 = 0;
    pub const ERROR_CODE_UNKNOWN_ERROR: i32 = -1;

    pub fn success(encryption_scheme: EncryptionScheme, user_encryption_key: Vec<u8>) -> Self {
        Self {
            code: Self::ERROR_CODE_SUCCESS,
            detail: "Success".to_string(),
            encryption_scheme,
            user_encryption_key,
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            code: Self::ERROR_CODE_UNKNOWN_ERROR,
            detail: detail.into(),
            encryption_scheme: EncryptionScheme::None,
            user_encryption_key: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckUserExistsRequest {
    pub user: String,
    pub organisation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckUserExistsResponse {
    pub code: i32,
    pub detail: String,
    pub user_exists: bool,
}

/// Echo request processed asynchronously by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnotherTestRequest {
    pub test_value: String,
    pub test_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnotherTestResponse {
    pub test_value: String,
    pub test_data: Vec<u8>,
}

/// Asks the server for a response large enough to be split into parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePartDownloadTestRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePartDownloadTestResponse {
    pub test_data: Vec<u8>,
}

/// An application error report captured on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitErrorReportRequest {
    pub id: Uuid,
    pub application_id: Uuid,
    pub application_version: i32,
    pub description: String,
    pub detail: String,
    pub feedback: String,
    pub when: DateTime<Utc>,
    pub who: String,
    pub device: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitErrorReportResponse {
    pub code: i32,
    pub detail: String,
    pub error_report_id: Uuid,
}

/// Every payload the system message handler understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    RegisterRequest(RegisterRequest),
    RegisterResponse(RegisterResponse),
    AuthenticateRequest(AuthenticateRequest),
    AuthenticateResponse(AuthenticateResponse),
    CheckUserExistsRequest(CheckUserExistsRequest),
    CheckUserExistsResponse(CheckUserExistsResponse),
    AnotherTestRequest(AnotherTestRequest),
    AnotherTestResponse(AnotherTestResponse),
    MessagePartDownloadTestRequest(MessagePartDownloadTestRequest),
    MessagePartDownloadTestResponse(MessagePartDownloadTestResponse),
    SubmitErrorReportRequest(SubmitErrorReportRequest),
    SubmitErrorReportResponse(SubmitErrorReportResponse),
}

message_data!(
    RegisterRequest,
    "a589dc87-2328-4a9b-bdb6-970e55ca2323",
    1,
    Priority::High
);
message_data!(
    RegisterResponse,
    "aa08aac9-4d15-452f-b3f9-756641b71735",
    1,
    Priority::High
);
message_data!(
    AuthenticateRequest,
    "d21fb54e-5c5b-49e8-881f-ce00c6ced1a3",
    1,
    Priority::High
);
message_data!(
    AuthenticateResponse,
    "82223035-1726-407f-8703-3977708e792c",
    1,
    Priority::High
);
message_data!(
    CheckUserExistsRequest,
    "cc005e6a-b01b-48eb-98a0-026297be69f3",
    1,
    Priority::High
);
message_data!(
    CheckUserExistsResponse,
    "a38bd55e-3470-46f1-a96a-a6b08a9adc63",
    1,
    Priority::High
);
message_data!(
    AnotherTestRequest,
    "e9918051-8ebc-48f1-bad7-13c59b550e1a",
    1,
    Priority::High
);
message_data!(
    AnotherTestResponse,
    "a714a9c6-2914-4498-ab59-64be9991bf37",
    1,
    Priority::High
);
message_data!(
    MessagePartDownloadTestRequest,
    "ddc9e1d2-4c21-4d24-8d63-3b4c2ff8b1a6",
    1,
    Priority::High
);
message_data!(
    MessagePartDownloadTestResponse,
    "7c2d3b55-1f6e-4b87-9e08-6a3f4e1d92c0",
    1,
    Priority::High
);
message_data!(
    SubmitErrorReportRequest,
    "ff638c33-b4f1-4e79-804c-9560da2543d6",
    1,
    Priority::High
);
message_data!(
    SubmitErrorReportResponse,
    "8be50cfa-2fb1-4634-9bfa-d01e77eaf766",
    1,
    Priority::High
);
