//! Server implementation
//!
//! HTTP server startup, background task wiring, graceful shutdown.

use crate::core::{BackgroundTasks, Config, ServerState, TaskKind};
use crate::notify::StatusEmailScheduler;
use std::time::Duration;

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state (tests, embedded use)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config)?,
        };

        // Background tasks
        let mut tasks = BackgroundTasks::new();
        let scheduler = StatusEmailScheduler::new(
            state.storage.clone(),
            state.mailer.clone(),
            state.tokens.clone(),
            state.scheduler_config(),
        );
        let period = Duration::from_secs(self.config.status_email_interval_secs);
        let shutdown = tasks.shutdown_token();
        tasks.spawn("status_email_sweep", TaskKind::Periodic, async move {
            scheduler.run(period, shutdown).await;
        });

        let app = crate::routes::build_app(&state);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        tracing::info!("Atelier back-office listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutting down...");
            })
            .await?;

        tasks.shutdown().await;
        Ok(())
    }
}
