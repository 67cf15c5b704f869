//! Server Implementation
//!
//! HTTP 服务器启动和管理

use crate::core::{BackgroundTasks, Config, ServerState, tasks};
use anyhow::Context;
use tokio_util::sync::CancellationToken;

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config, state: None }
    }

    /// Create server with existing state
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    /// Serve until Ctrl-C, then stop background tasks
    pub async fn run(&self) -> anyhow::Result<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        let shutdown = CancellationToken::new();
        let mut background = BackgroundTasks::with_token(shutdown.clone());
        tasks::register(&mut background, &state);
        background.log_summary();

        let app = crate::api::router(state);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        tracing::info!("Product Porter server listening on {}", addr);

        let signal = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down..."),
                    _ = signal.cancelled() => {}
                }
            })
            .await
            .context("HTTP server error")?;

        background.shutdown().await;
        Ok(())
    }
}
