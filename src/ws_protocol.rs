use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Event name clients use to submit a chat message over the socket.
pub const INBOUND_MESSAGE_EVENT: &str = "message";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEnvelope {
    pub event: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl WsEnvelope {
    pub fn event(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
            request_id: None,
            ts: Some(Utc::now().to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    #[validate(length(min = 1, max = 64))]
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100))]
    pub author_name: Option<String>,
    #[validate(length(max = 2000))]
    pub text: String,
}
