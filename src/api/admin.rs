//! Admin API endpoints
//!
//! The operator dashboard: registry overview, registration, node detail,
//! deletion and sending on behalf of a node. Guarded by the API key.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState, auth::require_api_key, error::parse_json};
use crate::Error;
use crate::db::{DEFAULT_MAILBOX_LIMIT, MessageEntry, NewRegistration, Node, NodeRef, NodeStatus};

// --- Request/Response types ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub node_name: String,
    pub esp32_device_id: String,
    pub lora_node_id: String,
    pub description: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl From<RegisterRequest> for NewRegistration {
    fn from(req: RegisterRequest) -> Self {
        Self {
            username: req.username,
            password: req.password,
            email: req.email,
            display_name: req.node_name,
            device_id: req.esp32_device_id,
            lora_node_id: req.lora_node_id,
            description: req.description,
            contact_name: req.contact_name,
            contact_email: req.contact_email,
            contact_phone: req.contact_phone,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardSendRequest {
    #[serde(default)]
    pub receiver_id: Option<i64>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct NodeResponse {
    pub id: i64,
    pub node_name: String,
    pub esp32_device_id: String,
    pub lora_node_id: String,
    pub status: &'static str,
    pub last_seen: Option<String>,
    pub description: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Node> for NodeResponse {
    fn from(node: Node) -> Self {
        Self {
            id: node.id,
            node_name: node.display_name,
            esp32_device_id: node.device_id,
            lora_node_id: node.lora_node_id,
            status: node.status.as_str(),
            last_seen: node.last_seen.map(|ts| ts.to_rfc3339()),
            description: node.description,
            contact_name: node.contact_name,
            contact_email: node.contact_email,
            contact_phone: node.contact_phone,
            created_at: node.created_at.to_rfc3339(),
            updated_at: node.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NodeRefResponse {
    pub id: i64,
    pub node_name: String,
    pub esp32_device_id: String,
}

impl From<NodeRef> for NodeRefResponse {
    fn from(node: NodeRef) -> Self {
        Self {
            id: node.id,
            node_name: node.display_name,
            esp32_device_id: node.device_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub sender: NodeRefResponse,
    pub receiver: NodeRefResponse,
    pub content: String,
    pub message_type: &'static str,
    pub status: &'static str,
    pub created_at: String,
    pub updated_at: String,
}

impl From<MessageEntry> for MessageResponse {
    fn from(entry: MessageEntry) -> Self {
        Self {
            id: entry.message.id,
            sender: entry.sender.into(),
            receiver: entry.receiver.into(),
            content: entry.message.content,
            message_type: entry.message.message_type.as_str(),
            status: entry.message.status.as_str(),
            created_at: entry.message.created_at.to_rfc3339(),
            updated_at: entry.message.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: i64,
    pub online: i64,
    pub offline: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub stats: StatsResponse,
    pub nodes: Vec<NodeResponse>,
    pub recent_messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize)]
pub struct NodeListResponse {
    pub online: Vec<NodeResponse>,
    pub offline: Vec<NodeResponse>,
    pub online_count: usize,
    pub offline_count: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct NodeDetailResponse {
    pub node: NodeResponse,
    pub inbox: Vec<MessageResponse>,
    pub outbox: Vec<MessageResponse>,
}

fn parse_node_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("invalid node id"))
}

fn to_responses(entries: Vec<MessageEntry>) -> Vec<MessageResponse> {
    entries.into_iter().map(Into::into).collect()
}

// --- Handlers ---

/// Registry statistics, every node and the latest messages
async fn dashboard(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let stats = state.nodes.stats()?;
    let nodes = state.nodes.list()?;
    let recent = state.messages.recent(DEFAULT_MAILBOX_LIMIT)?;

    Ok(Json(DashboardResponse {
        stats: StatsResponse {
            total: stats.total,
            online: stats.online,
            offline: stats.offline,
        },
        nodes: nodes.into_iter().map(Into::into).collect(),
        recent_messages: to_responses(recent),
    }))
}

/// All nodes grouped by status
async fn list_nodes(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<NodeListResponse>, ApiError> {
    let (online, offline): (Vec<Node>, Vec<Node>) = state
        .nodes
        .list()?
        .into_iter()
        .partition(|node| node.status == NodeStatus::Online);

    let online_count = online.len();
    let offline_count = offline.len();

    Ok(Json(NodeListResponse {
        online: online.into_iter().map(Into::into).collect(),
        offline: offline.into_iter().map(Into::into).collect(),
        online_count,
        offline_count,
        total: online_count + offline_count,
    }))
}

/// Register an account together with its node
async fn register_node(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<NodeResponse>), ApiError> {
    let req: RegisterRequest = parse_json(&body)?;
    let registration: NewRegistration = req.into();
    let nodes = state.nodes.clone();

    // Password hashing is CPU-bound; keep it off the async workers
    let node = tokio::task::spawn_blocking(move || nodes.register(&registration))
        .await
        .map_err(|e| Error::Database(format!("registration task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(node.into())))
}

/// A node with its inbox and outbox
async fn get_node(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<NodeDetailResponse>, ApiError> {
    let id = parse_node_id(&id)?;
    let node = state
        .nodes
        .get(id)?
        .ok_or_else(|| Error::NodeNotFound(format!("id {id}")))?;

    let inbox = state.messages.inbox_for(node.id, DEFAULT_MAILBOX_LIMIT)?;
    let outbox = state.messages.outbox_for(node.id, DEFAULT_MAILBOX_LIMIT)?;

    Ok(Json(NodeDetailResponse {
        node: node.into(),
        inbox: to_responses(inbox),
        outbox: to_responses(outbox),
    }))
}

/// Delete a node, its account and every message it took part in
async fn delete_node(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_node_id(&id)?;
    state.nodes.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a message on behalf of a node
async fn send_as_node(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let sender_id = parse_node_id(&id)?;
    let req: DashboardSendRequest = parse_json(&body)?;
    let receiver_id = req
        .receiver_id
        .ok_or_else(|| Error::MissingField("receiver_id".to_string()))?;

    let message = state
        .messages
        .send_from_dashboard(sender_id, receiver_id, &req.content)?;

    let entry = state
        .messages
        .get_entry(message.id)?
        .ok_or(Error::MessageNotFound(message.id))?;

    Ok((StatusCode::CREATED, Json(entry.into())))
}

/// Build admin router with auth middleware
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/nodes", get(list_nodes).post(register_node))
        .route("/nodes/{id}", get(get_node).delete(delete_node))
        .route("/nodes/{id}/messages", post(send_as_node))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}
