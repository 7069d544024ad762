//! Heartbeat timeout sweeper
//!
//! Periodically marks ONLINE nodes OFFLINE once their last status report is
//! older than the configured timeout.

use std::time::Duration;

use crate::config::LivenessConfig;
use crate::db::{DbPool, NodeRepo};
use crate::{Error, Result};

/// Periodically expires nodes whose last heartbeat is too old
#[derive(Clone)]
pub struct LivenessSweeper {
    nodes: NodeRepo,
    timeout: Duration,
    interval: Duration,
}

impl LivenessSweeper {
    /// Create a sweeper, or `None` when the heartbeat timeout is disabled
    #[must_use]
    pub fn new(db: DbPool, config: LivenessConfig) -> Option<Self> {
        let timeout = config.timeout()?;
        Some(Self {
            nodes: NodeRepo::new(db),
            timeout,
            interval: config.interval(),
        })
    }

    /// Run a single sweep, returning the number of nodes marked OFFLINE
    ///
    /// # Errors
    ///
    /// Returns error if the timeout is out of range or the update fails
    pub fn sweep_once(&self) -> Result<usize> {
        let timeout = chrono::Duration::from_std(self.timeout)
            .map_err(|e| Error::Config(format!("heartbeat timeout out of range: {e}")))?;
        let expired = self.nodes.expire_stale(timeout)?;

        if expired > 0 {
            tracing::info!(expired, "marked stale nodes offline");
        } else {
            tracing::debug!("liveness sweep found no stale nodes");
        }
        Ok(expired)
    }

    /// Run the sweep loop in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tracing::info!(
            timeout_secs = self.timeout.as_secs(),
            interval_secs = self.interval.as_secs(),
            "liveness sweeper started"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                if let Err(e) = self.sweep_once() {
                    tracing::warn!(error = %e, "liveness sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewRegistration, NodeStatus, init_memory};

    fn register(nodes: &NodeRepo, n: u32) {
        nodes
            .register(&NewRegistration {
                username: format!("node{n}"),
                password: "testpass123".to_string(),
                display_name: format!("Node {n}"),
                device_id: format!("ESP32-00{n}"),
                lora_node_id: format!("LORA-00{n}"),
                ..NewRegistration::default()
            })
            .unwrap();
    }

    #[test]
    fn test_disabled_when_timeout_zero() {
        let db = init_memory().unwrap();
        let config = LivenessConfig {
            heartbeat_timeout_secs: 0,
            sweep_interval_secs: 60,
        };
        assert!(LivenessSweeper::new(db, config).is_none());
    }

    #[test]
    fn test_sweep_once_expires_stale_nodes() {
        let db = init_memory().unwrap();
        let nodes = NodeRepo::new(db.clone());
        register(&nodes, 1);
        register(&nodes, 2);
        nodes.update_status("ESP32-001", "ONLINE").unwrap();
        nodes.update_status("ESP32-002", "ONLINE").unwrap();

        db.get()
            .unwrap()
            .execute(
                "UPDATE nodes SET last_seen = '2000-01-01T00:00:00.000000Z'
                 WHERE esp32_device_id = 'ESP32-001'",
                [],
            )
            .unwrap();

        let sweeper = LivenessSweeper::new(db, LivenessConfig::default()).unwrap();
        assert_eq!(sweeper.sweep_once().unwrap(), 1);
        assert_eq!(sweeper.sweep_once().unwrap(), 0);

        let stale = nodes.find_by_device_id("ESP32-001").unwrap().unwrap();
        assert_eq!(stale.status, NodeStatus::Offline);
        let fresh = nodes.find_by_device_id("ESP32-002").unwrap().unwrap();
        assert_eq!(fresh.status, NodeStatus::Online);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweeper_runs_on_interval() {
        let db = init_memory().unwrap();
        let nodes = NodeRepo::new(db.clone());
        register(&nodes, 1);
        nodes.update_status("ESP32-001", "ONLINE").unwrap();
        db.get()
            .unwrap()
            .execute("UPDATE nodes SET last_seen = '2000-01-01T00:00:00.000000Z'", [])
            .unwrap();

        let sweeper = LivenessSweeper::new(db, LivenessConfig::default()).unwrap();
        let handle = sweeper.spawn();

        tokio::time::sleep(Duration::from_secs(61)).await;
        handle.abort();

        let node = nodes.find_by_device_id("ESP32-001").unwrap().unwrap();
        assert_eq!(node.status, NodeStatus::Offline);
    }
}
