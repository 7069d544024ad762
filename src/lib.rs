//! LoRa Relay - node registry and store-and-forward message relay
//!
//! ESP32 devices with LoRa radios register here, report their status and
//! exchange short text messages through the relay:
//! - Node registry (accounts, devices, ONLINE/OFFLINE status, heartbeat expiry)
//! - Message store (send, inbox, outbox, delivery acknowledgement)
//! - HTTP API for devices and an API-key guarded admin dashboard
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │  ESP32 + LoRa devices    │   │  Operator dashboard      │
//! └────────────┬─────────────┘   └────────────┬─────────────┘
//!              │ /api/nodes, /api/messages    │ /api/admin
//! ┌────────────▼──────────────────────────────▼─────────────┐
//! │                   HTTP API (axum)                        │
//! └────────────┬───────────────────────────────┬────────────┘
//!              │                               │
//! ┌────────────▼─────────────┐   ┌─────────────▼────────────┐
//! │  NodeRepo / AccountRepo  │   │  MessageRepo             │
//! └────────────┬─────────────┘   └─────────────┬────────────┘
//!              └──────────── SQLite ───────────┘
//! ```

pub mod api;
pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod liveness;
pub mod seed;

pub use config::Config;
pub use daemon::Daemon;
pub use db::{DbConn, DbPool};
pub use error::{Error, ErrorKind, Result};
