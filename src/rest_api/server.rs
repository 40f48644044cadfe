//! Axum HTTP server for the REST API

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::controller::ControllerState;
use crate::maskinporten::{ClientRegistry, CredentialProvider};
use crate::{Error, Result};

use super::handlers;

/// Upper bound on one readiness check
pub const READY_TIMEOUT: Duration = Duration::from_secs(3);

/// The parts of the controller state the API reads
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<ClientRegistry>,
    pub provider: Arc<CredentialProvider>,
    pub ready_timeout: Duration,
}

impl From<&ControllerState> for ApiState {
    fn from(state: &ControllerState) -> Self {
        Self {
            registry: Arc::clone(&state.registry),
            provider: Arc::clone(&state.provider),
            ready_timeout: READY_TIMEOUT,
        }
    }
}

/// Metrics endpoint handler
#[cfg(feature = "metrics")]
async fn metrics_handler() -> std::result::Result<String, axum::http::StatusCode> {
    use prometheus_client::encoding::text::encode;
    let mut buffer = String::new();
    encode(&mut buffer, &crate::controller::metrics::REGISTRY)
        .map_err(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(buffer)
}

pub fn router(state: ApiState) -> Router {
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/api/v1/clients", get(handlers::list_clients))
        .route("/api/v1/clients/{app_id}", get(handlers::get_client));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(metrics_handler));

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Run the REST API server
pub async fn run_server(state: Arc<ControllerState>, port: u16) -> Result<()> {
    let app = router(ApiState::from(state.as_ref()));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("REST API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    Ok(())
}
