//! Device-facing node endpoints
//!
//! Nodes report their status here; each report counts as a heartbeat.

use std::sync::Arc;

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState, error::parse_json};
use crate::Error;

/// Status report from a device
#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    #[serde(default)]
    esp32_device_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Response to a status report
#[derive(Debug, Serialize)]
pub struct UpdateStatusResponse {
    pub success: bool,
    pub message: String,
    pub node_name: String,
}

/// Record a device status report
async fn update_status(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<UpdateStatusResponse>, ApiError> {
    let req: UpdateStatusRequest = parse_json(&body)?;

    let device_id = req
        .esp32_device_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::MissingField("esp32_device_id".to_string()))?;
    let status = req.status.unwrap_or_else(|| "ONLINE".to_string());

    let node = state.nodes.update_status(&device_id, &status)?;

    Ok(Json(UpdateStatusResponse {
        success: true,
        message: format!("Status updated to {}", node.status),
        node_name: node.display_name,
    }))
}

/// Build node routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/update-status", post(update_status))
        .route("/update-status/", post(update_status))
        .with_state(state)
}
