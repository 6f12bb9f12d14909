use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An application error report submitted from a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub id: Uuid,
    pub application_id: Uuid,
    pub application_version: i32,
    pub description: String,
    pub detail: String,
    pub feedback: String,
    pub created: DateTime<Utc>,
    pub who: String,
    pub device: String,
    pub data: Vec<u8>,
}
