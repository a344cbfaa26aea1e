//! Health and Prometheus metrics endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::state::{AppState, Store};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub version: &'static str,
}

/// GET /health: reports liveness and the configured store backend.
pub async fn health<S: Store>(State(state): State<Arc<AppState<S>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        store: state.store.backend(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
