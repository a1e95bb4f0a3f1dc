//! HTTP API
//!
//! - `GET /health` (unauthenticated)
//! - `POST /v1/ingest`, `POST /v1/retrieve`, `GET /v1/stats`, `POST /v1/clear`
//!   behind the shared-secret middleware

pub mod auth;
pub mod error;
pub mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    BoxError, Router,
    error_handling::HandleErrorLayer,
    middleware,
    routing::{get, post},
};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{RetrievalConfig, ServerConfig};
use crate::error::{MemexError, Result};
use crate::memory::MemoryManager;

/// Shared application state for all handlers
pub struct AppState {
    pub manager: Arc<MemoryManager>,
    /// Shared secret every `/v1` request must present
    pub api_key: SecretString,
    /// Defaults for omitted retrieval parameters
    pub retrieval: RetrievalConfig,
}

/// The memory API server
pub struct ApiServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(
        config: ServerConfig,
        retrieval: RetrievalConfig,
        manager: Arc<MemoryManager>,
        api_key: SecretString,
    ) -> Self {
        Self {
            config,
            state: Arc::new(AppState {
                manager,
                api_key,
                retrieval,
            }),
        }
    }

    /// Bind the configured address and serve until Ctrl+C or SIGTERM.
    pub async fn serve(&self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| MemexError::Config(format!("Invalid listen address: {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MemexError::Config(format!("Failed to bind to {addr}: {e}")))?;

        tracing::info!("Starting memory API on {addr}");
        self.run(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then flush the store.
    pub async fn run(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let app = create_router(
            Arc::clone(&self.state),
            Duration::from_secs(self.config.request_timeout_secs),
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(MemexError::Io)?;

        self.state.manager.flush().await?;
        tracing::info!("Memory API shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let protected = Router::new()
        .route("/v1/ingest", post(handlers::ingest_handler))
        .route("/v1/retrieve", post(handlers::retrieve_handler))
        .route("/v1/stats", get(handlers::stats_handler))
        .route("/v1/clear", post(handlers::clear_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                    error::middleware_error(err, request_timeout)
                }))
                .timeout(request_timeout),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
