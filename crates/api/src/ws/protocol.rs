//! JSON messages exchanged over the progress socket.
//!
//! Client to server:
//!
//! ```text
//! { "type": "authenticate", "token": "<jwt>" }
//! { "type": "subscribe_to_generation", "generationId": "<uuid>" }
//! { "type": "unsubscribe_from_generation", "generationId": "<uuid>" }
//! ```
//!
//! Server replies use the same `{ "event", "data" }` envelope as progress
//! events.

use axum::extract::ws::Message;
use modelgen_core::types::OwnerId;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Authenticate {
        token: String,
    },
    SubscribeToGeneration {
        #[serde(rename = "generationId")]
        generation_id: Uuid,
    },
    UnsubscribeFromGeneration {
        #[serde(rename = "generationId")]
        generation_id: Uuid,
    },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("Unrecognized message: {e}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReply {
    Authenticated { owner_id: OwnerId },
    Subscribed { generation_id: Uuid },
    Unsubscribed { generation_id: Uuid },
    Error { message: String },
}

impl ServerReply {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Authenticated { owner_id } => {
                json!({ "event": "authenticated", "data": { "userId": owner_id } })
            }
            Self::Subscribed { generation_id } => {
                json!({ "event": "subscribed", "data": { "generationId": generation_id } })
            }
            Self::Unsubscribed { generation_id } => {
                json!({ "event": "unsubscribed", "data": { "generationId": generation_id } })
            }
            Self::Error { message } => json!({ "event": "error", "data": { "message": message } }),
        }
    }

    pub fn to_message(&self) -> Message {
        Message::Text(self.to_json().to_string().into())
    }
}
