//! Order lookup endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use store::{Order, OrderLedger};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::{AppState, MarketplaceStore};

/// GET /orders/{id}: an order with its lines. Only the buyer may read it.
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .ledger
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    if order.user_id != user_id {
        return Err(ApiError::Forbidden(format!(
            "Order {id} belongs to another user"
        )));
    }

    Ok(Json(order))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse::<i64>()
        .map(OrderId::new)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}
