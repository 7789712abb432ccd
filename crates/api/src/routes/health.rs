//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::{AppState, MarketplaceStore};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
    pub version: &'static str,
}

/// GET /health: returns system health status.
pub async fn check<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        storage: state.backend,
        version: env!("CARGO_PKG_VERSION"),
    })
}
