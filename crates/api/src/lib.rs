//! HTTP API server with observability for the storefront order service.
//!
//! Exposes order placement with all-or-nothing stock reservation, order
//! lookups and status changes, and product stock management, with
//! structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, patch, put};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

use config::{Config, CorsConfig};
pub use state::{AppState, Store};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    config: &Config,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    let request_log = &config.request_log;

    Router::new()
        .route("/health", get(routes::system::health::<S>))
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::place::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route(
            "/products/{id}/stock",
            put(routes::products::put_stock::<S>).get(routes::products::get_stock::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(cors_layer(&config.cors))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(request_log.level)
                        .include_headers(request_log.include_headers),
                )
                .on_response(DefaultOnResponse::new().level(request_log.level)),
        )
}

/// Creates the application state over the given store.
pub fn create_state<S: Store>(store: S, config: &Config) -> Arc<AppState<S>> {
    AppState::new(store, config)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match &config.allowed_origins {
        None => layer.allow_origin(Any),
        Some(origins) => layer.allow_origin(AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )),
    }
}
