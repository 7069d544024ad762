//! Shared test utilities

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use lora_relay::DbPool;
use lora_relay::api::ApiServerBuilder;
use lora_relay::db::{self, NewRegistration, Node, NodeRepo};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_API_KEY: &str = "test-api-key";

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Register a node with device id `device_id` and a matching username
pub fn register_test_node(db: &DbPool, username: &str, device_id: &str) -> Node {
    NodeRepo::new(db.clone())
        .register(&NewRegistration {
            username: username.to_string(),
            password: "testpass123".to_string(),
            display_name: format!("Node {username}"),
            device_id: device_id.to_string(),
            lora_node_id: format!("LORA-{device_id}"),
            ..NewRegistration::default()
        })
        .expect("failed to register test node")
}

/// Build the full application router with the test API key
#[must_use]
pub fn build_test_router(db: DbPool) -> Router {
    ApiServerBuilder::new(db)
        .api_key(Some(TEST_API_KEY.to_string()))
        .build()
        .router()
}

/// Send a request and decode the JSON body (`Value::Null` when empty)
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request failed");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is not JSON")
    };
    (status, json)
}

/// Device request: raw JSON body, no content type
pub fn device_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}

/// Admin request carrying the test API key
pub fn admin(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TEST_API_KEY}"));

    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("failed to build request")
}
