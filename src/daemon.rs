//! Daemon - the main relay service
//!
//! Opens the database, serves the HTTP API and runs the liveness sweeper
//! until interrupted.

use tokio::sync::mpsc;

use crate::api::ApiServerBuilder;
use crate::db::{self, DbPool};
use crate::liveness::LivenessSweeper;
use crate::{Config, Error, Result};

/// The relay daemon
pub struct Daemon {
    config: Config,
    port: u16,
    db: DbPool,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened
    pub fn new(config: Config, port: u16) -> Result<Self> {
        let db = db::init(&config.database_path)?;

        tracing::info!(path = %config.database_path.display(), "database opened");

        Ok(Self { config, port, db })
    }

    /// Run until Ctrl-C or until the API server fails
    ///
    /// # Errors
    ///
    /// Returns error if the API server fails to bind or stops unexpectedly
    pub async fn run(self) -> Result<()> {
        tracing::info!(port = self.port, "daemon running");

        let sweeper =
            LivenessSweeper::new(self.db.clone(), self.config.liveness).map(LivenessSweeper::spawn);
        if sweeper.is_none() {
            tracing::info!("heartbeat timeout disabled");
        }

        let mut api_handle = ApiServerBuilder::new(self.db.clone())
            .api_key(self.config.api_server.api_key.clone())
            .port(self.port)
            .inbox_limit(self.config.inbox_limit)
            .build()
            .spawn();

        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        let finished = tokio::select! {
            _ = shutdown_rx.recv() => None,
            joined = &mut api_handle => Some(joined),
        };

        let result = match finished {
            None => {
                tracing::info!("shutdown requested");
                api_handle.abort();
                Ok(())
            }
            Some(Ok(result)) => result,
            Some(Err(e)) => Err(Error::Config(format!("API server task failed: {e}"))),
        };

        if let Some(handle) = sweeper {
            handle.abort();
        }

        tracing::info!("daemon stopped");
        result
    }
}
