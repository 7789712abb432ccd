//! HTTP API server with observability for the marketplace checkout core.
//!
//! Provides REST endpoints for carts, checkout and order lookup, with
//! structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use checkout::CheckoutEngine;
use domain::CartService;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CartStore, CatalogStore, OrderLedger};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// A backend implementing every store the API needs.
pub trait MarketplaceStore: CatalogStore + CartStore + OrderLedger + Clone + 'static {}

impl<T> MarketplaceStore for T where T: CatalogStore + CartStore + OrderLedger + Clone + 'static {}

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketplaceStore> {
    pub carts: CartService<S, S>,
    pub checkout: CheckoutEngine<S, S, S>,
    pub ledger: S,
    /// Name of the storage backend, reported by `/health`.
    pub backend: &'static str,
}

/// Creates the application state over a single store.
pub fn create_state<S: MarketplaceStore>(store: S, backend: &'static str) -> Arc<AppState<S>> {
    Arc::new(AppState {
        carts: CartService::new(store.clone(), store.clone()),
        checkout: CheckoutEngine::new(store.clone(), store.clone(), store.clone()),
        ledger: store,
        backend,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketplaceStore>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart", post(routes::cart::add::<S>))
        .route("/cart/{entry_id}", delete(routes::cart::remove::<S>))
        .route("/cart/checkout", post(routes::cart::checkout::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
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
