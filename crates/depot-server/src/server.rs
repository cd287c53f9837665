use std::sync::Arc;

use depot_core::{Catalog, Depot, ServerConfig};
use tokio::net::TcpListener;

use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Depot HTTP server.
pub struct DepotServer<C> {
    depot: Arc<Depot<C>>,
    config: ServerConfig,
}

impl<C: Catalog + 'static> DepotServer<C> {
    pub fn new(depot: Arc<Depot<C>>, config: ServerConfig) -> Self {
        Self { depot, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        let state = AppState {
            depot: Arc::clone(&self.depot),
            default_page_size: self.config.default_page_size,
        };
        build_router(state, self.config.max_object_size)
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "depot server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::CoordinatorConfig;

    #[test]
    fn server_construction() {
        let depot = Arc::new(Depot::in_memory(&CoordinatorConfig::default()));
        let server = DepotServer::new(depot, ServerConfig::default());
        assert_eq!(server.config().bind_addr, "0.0.0.0:13496".parse().unwrap());
        let _router = server.router();
    }
}
