use thiserror::Error;

use crate::{CartEntryId, ProductId, UserId};

/// Errors that can occur when interacting with the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product does not exist in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A conditional update on a product lost: it was already sold (or, for a
    /// release, it is not in a releasable state).
    #[error("Conflicting update on product {0}")]
    Conflict(ProductId),

    /// The user already has this product in their cart.
    #[error("Product {product_id} is already in the cart of user {user_id}")]
    AlreadyExists {
        user_id: UserId,
        product_id: ProductId,
        existing: CartEntryId,
    },

    /// The cart entry does not exist.
    #[error("Cart entry not found: {0}")]
    CartEntryNotFound(CartEntryId),

    /// The requester does not own the cart entry.
    #[error("User {requester} does not own cart entry {entry_id}")]
    Forbidden {
        entry_id: CartEntryId,
        requester: UserId,
    },

    /// Cart entries an order was meant to consume were removed before the
    /// order could be recorded.
    #[error("Cart changed during checkout: entries {0:?} are gone")]
    CartChanged(Vec<CartEntryId>),

    /// A write would break a cross-relation invariant.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// The backend refused the write for a reason unrelated to its content.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
