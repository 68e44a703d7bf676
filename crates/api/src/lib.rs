//! HTTP API server with observability for the smart-basket tracker.
//!
//! Provides REST endpoints for sensor syncs, checkout, cashier decisions and
//! audit history, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use audit_log::{AuditSink, InMemoryAuditLog};
use axum::Router;
use axum::routing::{get, post};
use domain::{
    BasketService, BasketStore, Catalog, InMemoryBasketStore, PlainTextEncoder, QrEncoder,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::baskets::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, A>(state: Arc<AppState<S, A>>, metrics_handle: PrometheusHandle) -> Router
where
    S: BasketStore + 'static,
    A: AuditSink + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/sync", post(routes::baskets::sync::<S, A>))
        .route("/basket/{id}", get(routes::baskets::get::<S, A>))
        .route("/basket/{id}/total", get(routes::baskets::total::<S, A>))
        .route("/checkout", post(routes::baskets::checkout::<S, A>))
        .route("/decision", post(routes::baskets::decision::<S, A>))
        .route(
            "/adjustQuantity",
            post(routes::baskets::adjust_quantity::<S, A>),
        )
        .route("/audit/{id}", get(routes::baskets::audit::<S, A>))
        .route("/archive", get(routes::baskets::archive::<S, A>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wraps a service in application state with the given QR encoder.
pub fn create_state<S, A>(
    service: Arc<BasketService<S, A>>,
    qr_encoder: Arc<dyn QrEncoder>,
) -> Arc<AppState<S, A>>
where
    S: BasketStore,
    A: AuditSink,
{
    Arc::new(AppState {
        service,
        qr_encoder,
    })
}

/// Creates application state backed by in-memory storage.
pub fn create_default_state(
    catalog: Arc<dyn Catalog>,
) -> Arc<AppState<InMemoryBasketStore, InMemoryAuditLog>> {
    let service = BasketService::new(
        InMemoryBasketStore::new(),
        InMemoryAuditLog::new(),
        catalog,
    );
    create_state(Arc::new(service), Arc::new(PlainTextEncoder))
}
