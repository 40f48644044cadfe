//! HTTP handlers for the REST API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{instrument, warn};

use super::dto::{ClientListResponse, ClientSummary, ErrorResponse, HealthResponse, ReadyResponse};
use super::server::ApiState;

/// Health check endpoint
#[instrument]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Ready once the operator can obtain its own access token.
#[instrument(skip(state))]
pub async fn ready(
    State(state): State<ApiState>,
) -> Result<Json<ReadyResponse>, (StatusCode, Json<ErrorResponse>)> {
    let unavailable = |e: crate::Error| {
        warn!("Readiness check failed: {}", e);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(e.kind(), &e.to_string())),
        )
    };

    let check = async {
        let metadata = state.provider.discovery_metadata().await?;
        state.provider.access_token().await?;
        Ok::<_, crate::Error>(metadata)
    };
    let metadata = match tokio::time::timeout(state.ready_timeout, check).await {
        Ok(result) => result.map_err(unavailable)?,
        Err(_) => {
            warn!(
                timeout_ms = state.ready_timeout.as_millis() as u64,
                "Readiness check timed out"
            );
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(
                    "timeout",
                    "Maskinporten did not answer within the readiness timeout",
                )),
            ));
        }
    };

    Ok(Json(ReadyResponse {
        ready: true,
        issuer: metadata.issuer.clone(),
    }))
}

/// List all registered clients
#[instrument(skip(state))]
pub async fn list_clients(State(state): State<ApiState>) -> Json<ClientListResponse> {
    let items: Vec<ClientSummary> = state
        .registry
        .list()
        .into_iter()
        .map(ClientSummary::from)
        .collect();
    let total = items.len();
    Json(ClientListResponse { items, total })
}

/// Get the client registered for one application
#[instrument(skip(state), fields(app_id = %app_id))]
pub async fn get_client(
    State(state): State<ApiState>,
    Path(app_id): Path<String>,
) -> Result<Json<ClientSummary>, (StatusCode, Json<ErrorResponse>)> {
    match state.registry.get(&app_id) {
        Ok(Some(info)) => Ok(Json(info.into())),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "not_found",
                &format!("No client registered for app {app_id}"),
            )),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.kind(), &e.to_string())),
        )),
    }
}
