use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every inbound frame is `{ "type": ..., "data": ... }`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    // status-only frames may omit it
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn message_kind(&self) -> MessageKind {
        MessageKind::from_type(&self.kind)
    }
}

/// Known envelope types. Anything else lands in `Other` and is handled on a
/// best-effort basis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    InitialData,
    BulkUpdate,
    SingleUpdate,
    SystemStatus,
    Status,
    Ping,
    Error,
    Other(String),
}

impl MessageKind {
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "initial_data" => Self::InitialData,
            "bulk_update" => Self::BulkUpdate,
            "single_update" => Self::SingleUpdate,
            "system_status" => Self::SystemStatus,
            "status" => Self::Status,
            "ping" => Self::Ping,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}
