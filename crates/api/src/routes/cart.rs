//! Cart and checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::CheckoutReceipt;
use common::{CartEntryId, ProductId};
use domain::CartView;
use serde::{Deserialize, Serialize};
use store::CartEntry;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::{AppState, MarketplaceStore};

// -- Request types --

#[derive(Deserialize, Default)]
pub struct AddToCartRequest {
    #[serde(default)]
    pub product_id: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub shipping_address: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// -- Handlers --

/// GET /cart: the caller's cart, with stale entries reported separately.
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.carts.get_cart(user_id).await?))
}

/// POST /cart: add a product to the caller's cart.
#[tracing::instrument(skip(state, body))]
pub async fn add<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    body: Bytes,
) -> Result<(StatusCode, Json<CartEntry>), ApiError> {
    let req: AddToCartRequest = if body.is_empty() {
        AddToCartRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid product ID: {e}")))?
    };
    let product_id = match req.product_id {
        None => return Err(ApiError::BadRequest("Product ID is required".to_string())),
        Some(id) if id <= 0 => {
            return Err(ApiError::BadRequest(format!("Invalid product ID: {id}")));
        }
        Some(id) => ProductId::new(id),
    };

    let entry = state.carts.add_to_cart(user_id, product_id).await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /cart/{entry_id}: remove an entry from the caller's cart.
#[tracing::instrument(skip(state))]
pub async fn remove<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(entry_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let entry_id = parse_entry_id(&entry_id)?;
    state.carts.remove_from_cart(user_id, entry_id).await?;

    Ok(Json(MessageResponse {
        message: "Item removed from cart",
    }))
}

/// POST /cart/checkout: turn the caller's whole cart into an order.
///
/// The body is optional; the shipping address defaults to empty.
#[tracing::instrument(skip(state, body))]
pub async fn checkout<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    body: Bytes,
) -> Result<(StatusCode, Json<CheckoutReceipt>), ApiError> {
    let req: CheckoutRequest = if body.is_empty() {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid checkout request: {e}")))?
    };
    let receipt = state
        .checkout
        .checkout(user_id, req.shipping_address)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

fn parse_entry_id(id: &str) -> Result<CartEntryId, ApiError> {
    id.parse::<i64>()
        .map(CartEntryId::new)
        .map_err(|e| ApiError::BadRequest(format!("Invalid cart entry ID: {e}")))
}
