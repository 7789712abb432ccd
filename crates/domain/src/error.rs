//! Domain error types.

use common::{CartEntryId, ProductId};
use store::StoreError;
use thiserror::Error;

/// Broad category of a failure, used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller-fixable input problem. Nothing was written.
    Validation,
    /// The cart went stale or lost a race. Refresh before retrying.
    Conflict,
    /// A durable write failed after reservation. State was restored; retry is safe.
    Integrity,
    /// The caller does not own the resource.
    Permission,
    /// Unexpected backend failure.
    Internal,
}

/// Errors returned by the cart mutation service.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product has already been sold.
    #[error("Product {0} is no longer available")]
    ProductUnavailable(ProductId),

    /// Sellers cannot buy their own products.
    #[error("Cannot add your own product {0} to the cart")]
    SelfPurchaseForbidden(ProductId),

    /// The product is already in the caller's cart.
    #[error("Product {product_id} is already in the cart (entry {entry_id})")]
    AlreadyInCart {
        product_id: ProductId,
        entry_id: CartEntryId,
    },

    /// The cart entry does not exist.
    #[error("Cart entry not found: {0}")]
    NotFound(CartEntryId),

    /// The cart entry belongs to another user.
    #[error("Not allowed to modify cart entry {0}")]
    Forbidden(CartEntryId),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl CartError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::ProductNotFound(_)
            | CartError::ProductUnavailable(_)
            | CartError::SelfPurchaseForbidden(_)
            | CartError::AlreadyInCart { .. }
            | CartError::NotFound(_) => ErrorKind::Validation,
            CartError::Forbidden(_) => ErrorKind::Permission,
            CartError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for CartError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ProductNotFound(id) => CartError::ProductNotFound(id),
            StoreError::AlreadyExists {
                product_id,
                existing,
                ..
            } => CartError::AlreadyInCart {
                product_id,
                entry_id: existing,
            },
            StoreError::CartEntryNotFound(id) => CartError::NotFound(id),
            StoreError::Forbidden { entry_id, .. } => CartError::Forbidden(entry_id),
            other => CartError::Store(other),
        }
    }
}
