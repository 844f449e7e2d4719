use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::application::{InterfaceListing, MonitoringService, QueryEngine, RangeKey, RangeReport, Snapshot};
use crate::ports::{BoxError, MetricStore, StoreError};

/// Custom error type that implements IntoResponse
#[derive(Debug)]
pub struct AppError(String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0).into_response()
    }
}

impl From<BoxError> for AppError {
    fn from(err: BoxError) -> Self {
        AppError(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError(err.to_string())
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub monitoring: Arc<MonitoringService>,
    pub query: Arc<QueryEngine>,
    pub store: Arc<dyn MetricStore>,
}

/// Response for /api/health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub hostname: String,
    pub default_nic: String,
    pub samples: usize,
    /// Unix seconds of the newest stored sample
    pub last_sample: Option<f64>,
}

/// Query params for /api/metrics
#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub range: Option<String>,
}

/// Handler for GET /api/health
#[debug_handler]
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let samples = state.store.len().await?;
    let last_sample = state.store.latest().await?.map(|s| s.timestamp);

    Ok(Json(HealthResponse {
        status: "healthy",
        service: "hostpulse",
        hostname: state.monitoring.identity().hostname.clone(),
        default_nic: state.monitoring.default_nic().to_string(),
        samples,
        last_sample,
    }))
}

/// Handler for GET /api/current
#[debug_handler]
pub async fn current_handler(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.monitoring.snapshot().await)
}

/// Handler for GET /api/interfaces
#[debug_handler]
pub async fn interfaces_handler(
    State(state): State<AppState>,
) -> Result<Json<InterfaceListing>, AppError> {
    Ok(Json(state.monitoring.interfaces().await?))
}

/// Handler for GET /api/metrics
#[debug_handler]
pub async fn metrics_handler(
    State(state): State<AppState>,
    Query(params): Query<MetricsQuery>,
) -> Result<Json<RangeReport>, AppError> {
    let key = RangeKey::parse_or_default(params.range.as_deref());
    Ok(Json(state.query.query(key).await?))
}
