//! HTTP API server for the relay
//!
//! Device endpoints live under `/api/nodes` and `/api/messages` and are
//! unauthenticated; the operator dashboard lives under `/api/admin`.

pub mod admin;
mod auth;
mod error;
pub mod health;
pub mod messages;
pub mod nodes;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::db::{DEFAULT_MAILBOX_LIMIT, DbPool, MessageRepo, NodeRepo};

pub use error::ApiError;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub api_key: Option<String>,
    pub nodes: NodeRepo,
    pub messages: MessageRepo,
    pub inbox_limit: usize,
}

/// Builder for [`ApiServer`]
pub struct ApiServerBuilder {
    db: DbPool,
    api_key: Option<String>,
    port: u16,
    inbox_limit: usize,
}

impl ApiServerBuilder {
    /// Start a builder over an initialized database
    #[must_use]
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            api_key: None,
            port: crate::config::DEFAULT_PORT,
            inbox_limit: DEFAULT_MAILBOX_LIMIT,
        }
    }

    /// Require this bearer key on the admin API
    #[must_use]
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Port to listen on
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Maximum messages returned by a device inbox
    #[must_use]
    pub const fn inbox_limit(mut self, limit: usize) -> Self {
        self.inbox_limit = limit;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            nodes: NodeRepo::new(self.db.clone()),
            messages: MessageRepo::new(self.db.clone()),
            db: self.db,
            api_key: self.api_key,
            inbox_limit: self.inbox_limit,
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let router = Router::new()
            .nest("/api/admin", admin::router(self.state.clone()))
            .nest("/api/nodes", nodes::router(self.state.clone()))
            .nest("/api/messages", messages::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        // CORS layer for cross-origin requests from the dashboard frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.api_key.is_none() {
            tracing::warn!("RELAY_API_KEY not set - admin API is unauthenticated");
        }

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
