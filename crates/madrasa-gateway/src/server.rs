use std::sync::Arc;

use madrasa_common::{Error, Result};
use madrasa_config::AppConfig;
use madrasa_db::Database;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::router::build_router;
use crate::state::AppState;

/// Binds the configured address and serves the HTTP API until ctrl-c.
pub struct GatewayServer {
    config: AppConfig,
    db: Arc<Database>,
}

impl GatewayServer {
    pub fn new(config: AppConfig, db: Arc<Database>) -> Self {
        Self { config, db }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);

        self.warn_pending_migrations();

        let state = Arc::new(AppState::new(self.db));
        let app = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        info!("madrasa gateway listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Other(format!("server error: {e}")))?;

        info!("madrasa gateway stopped");
        Ok(())
    }

    fn warn_pending_migrations(&self) {
        match self.db.pending_migrations() {
            Ok(pending) if pending.is_empty() => {}
            Ok(pending) => {
                for action in &pending {
                    warn!("pending schema migration: {action}");
                }
                warn!("run `madrasa migrate` to bring the database schema up to date");
            }
            Err(e) => warn!("failed to inspect database schema: {e}"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
