//! Combined store and stream health endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use ledger::StockStore;
use serde::Serialize;

use super::products::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mode: &'static str,
    pub storage: &'static str,
    pub tls: bool,
    pub store: &'static str,
    pub kafka: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kafka_error: Option<String>,
}

/// GET /api/v1/health: 200 when every enabled component is reachable, else 503.
pub async fn check<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = match state.ledger.store().ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "stock store health check failed");
            false
        }
    };

    let (kafka, kafka_error) = match &state.stream {
        None => ("disabled", None),
        Some(stream) => match stream.health_check().await {
            Ok(()) => ("healthy", None),
            Err(err) => {
                tracing::warn!(error = %err, "event stream health check failed");
                ("unhealthy", Some(err.to_string()))
            }
        },
    };

    let healthy = store_ok && kafka != "unhealthy";
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        mode: state.deployment.mode,
        storage: state.deployment.storage,
        tls: state.deployment.tls,
        store: if store_ok { "healthy" } else { "unhealthy" },
        kafka,
        kafka_error,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
