use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{notification::notification_service::DeliverySnapshot, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub storage: String,
    pub subscribers: usize,
    pub delivery: DeliverySnapshot,
}

/// Service health and real-time delivery counters
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Storage reachable", body = HealthResponse),
        (status = 503, description = "Storage unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, code) = match state.store.ping().await {
        Ok(()) => (HealthStatus::Healthy, StatusCode::OK),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (HealthStatus::Degraded, StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.config.storage_backend.as_str().to_string(),
        subscribers: state.notification_bus.subscriber_count(),
        delivery: state.dispatcher.stats(),
    };

    (code, Json(response))
}
