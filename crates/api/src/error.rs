//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::{CartError, ErrorKind};
use serde_json::{Value, json};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed caller identity.
    Unauthorized(String),
    /// Caller may not access the resource.
    Forbidden(String),
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Cart rule violation or cart store failure.
    Cart(CartError),
    /// Checkout failure.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, extra) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Cart(err) => cart_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let mut body = json!({ "error": message });
        if let (Some((key, value)), Some(map)) = (extra, body.as_object_mut()) {
            map.insert(key.to_string(), value);
        }
        (status, axum::Json(body)).into_response()
    }
}

type Mapped = (StatusCode, String, Option<(&'static str, Value)>);

fn cart_error_to_response(err: CartError) -> Mapped {
    let message = err.to_string();
    match &err {
        CartError::ProductNotFound(_) | CartError::NotFound(_) => {
            (StatusCode::NOT_FOUND, message, None)
        }
        CartError::AlreadyInCart { entry_id, .. } => (
            StatusCode::BAD_REQUEST,
            message,
            Some(("entry_id", json!(entry_id))),
        ),
        _ => (kind_to_status(err.kind()), message, None),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> Mapped {
    let message = err.to_string();
    match err {
        CheckoutError::ItemsUnavailable { items, .. } => (
            StatusCode::CONFLICT,
            message,
            Some(("unavailable", json!(items))),
        ),
        CheckoutError::CartChanged { entries, .. } => (
            StatusCode::CONFLICT,
            message,
            Some(("removed", json!(entries))),
        ),
        CheckoutError::CheckoutFailed { .. } => (StatusCode::SERVICE_UNAVAILABLE, message, None),
        other => (kind_to_status(other.kind()), message, None),
    }
}

fn kind_to_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Integrity => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Permission => StatusCode::FORBIDDEN,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CartEntryId, ProductId, UserId};

    #[test]
    fn test_cart_status_mapping() {
        let cases = [
            (
                CartError::ProductNotFound(ProductId::new(1)),
                StatusCode::NOT_FOUND,
            ),
            (
                CartError::ProductUnavailable(ProductId::new(1)),
                StatusCode::BAD_REQUEST,
            ),
            (
                CartError::SelfPurchaseForbidden(ProductId::new(1)),
                StatusCode::BAD_REQUEST,
            ),
            (
                CartError::NotFound(CartEntryId::new(1)),
                StatusCode::NOT_FOUND,
            ),
            (
                CartError::Forbidden(CartEntryId::new(1)),
                StatusCode::FORBIDDEN,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_checkout_status_mapping() {
        let empty = CheckoutError::EmptyCart(UserId::new(1));
        assert_eq!(
            ApiError::from(empty).into_response().status(),
            StatusCode::BAD_REQUEST
        );

        let failed = CheckoutError::CheckoutFailed {
            reason: "ledger down".to_string(),
            released: vec![],
        };
        assert_eq!(
            ApiError::from(failed).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        let unavailable = CheckoutError::ItemsUnavailable {
            items: vec![],
            during: checkout::CheckoutState::Rejected,
        };
        assert_eq!(
            ApiError::from(unavailable).into_response().status(),
            StatusCode::CONFLICT
        );

        let changed = CheckoutError::CartChanged {
            entries: vec![CartEntryId::new(3)],
            released: vec![ProductId::new(1)],
        };
        assert_eq!(
            ApiError::from(changed).into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_unauthorized() {
        let response = ApiError::Unauthorized("missing x-user-id".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
