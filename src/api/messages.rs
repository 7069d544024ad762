//! Device-facing message endpoints: send, inbox and acknowledge

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState, error::parse_json};
use crate::Error;
use crate::db::MessageEntry;

#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    from_esp32_device_id: Option<String>,
    #[serde(default)]
    to_esp32_device_id: Option<String>,
    #[serde(default)]
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AckRequest {
    #[serde(default)]
    esp32_device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub message_id: i64,
    pub message: &'static str,
}

/// Sender as shown in a device inbox
#[derive(Debug, Serialize)]
pub struct SenderInfo {
    pub node_name: String,
    pub esp32_device_id: String,
}

/// One inbox entry
#[derive(Debug, Serialize)]
pub struct InboxMessage {
    pub id: i64,
    pub from: SenderInfo,
    pub content: String,
    pub status: &'static str,
    pub created_at: String,
}

impl From<MessageEntry> for InboxMessage {
    fn from(entry: MessageEntry) -> Self {
        Self {
            id: entry.message.id,
            from: SenderInfo {
                node_name: entry.sender.display_name,
                esp32_device_id: entry.sender.device_id,
            },
            content: entry.message.content,
            status: entry.message.status.as_str(),
            created_at: entry.message.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub success: bool,
    pub node_name: String,
    pub count: usize,
    pub messages: Vec<InboxMessage>,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
    pub message_id: i64,
    pub status: &'static str,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Relay a message from one device to another
async fn send_message(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<SendResponse>, ApiError> {
    let req: SendRequest = parse_json(&body)?;

    let (Some(from), Some(to), Some(payload)) = (
        non_empty(req.from_esp32_device_id),
        non_empty(req.to_esp32_device_id),
        non_empty(req.payload),
    ) else {
        return Err(Error::Validation(
            "from_esp32_device_id, to_esp32_device_id, and payload are required".to_string(),
        )
        .into());
    };

    let message = state.messages.send(&from, &to, &payload)?;

    Ok(Json(SendResponse {
        success: true,
        message_id: message.id,
        message: "Message sent successfully",
    }))
}

/// Latest messages addressed to a device
async fn inbox(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
) -> Result<Json<InboxResponse>, ApiError> {
    let mailbox = state.messages.inbox(&device_id, state.inbox_limit)?;

    tracing::debug!(
        device_id = %device_id,
        count = mailbox.messages.len(),
        "inbox fetched"
    );

    let messages: Vec<InboxMessage> = mailbox.messages.into_iter().map(Into::into).collect();
    Ok(Json(InboxResponse {
        success: true,
        node_name: mailbox.node.display_name,
        count: messages.len(),
        messages,
    }))
}

/// Mark a message delivered on behalf of its receiver
async fn acknowledge(
    State(state): State<Arc<ApiState>>,
    Path(message_id): Path<String>,
    body: Bytes,
) -> Result<Json<AckResponse>, ApiError> {
    let message_id: i64 = message_id
        .parse()
        .map_err(|_| ApiError::bad_request("invalid message id"))?;
    let req: AckRequest = parse_json(&body)?;
    let device_id = non_empty(req.esp32_device_id)
        .ok_or_else(|| Error::MissingField("esp32_device_id".to_string()))?;

    let message = state.messages.acknowledge(message_id, &device_id)?;

    Ok(Json(AckResponse {
        success: true,
        message_id: message.id,
        status: message.status.as_str(),
    }))
}

/// Build message routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/send", post(send_message))
        .route("/send/", post(send_message))
        .route("/inbox/{esp32_device_id}", get(inbox))
        .route("/inbox/{esp32_device_id}/", get(inbox))
        .route("/{message_id}/ack", post(acknowledge))
        .route("/{message_id}/ack/", post(acknowledge))
        .with_state(state)
}
