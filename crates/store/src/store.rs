use async_trait::async_trait;

use crate::{
    CartEntry, CartEntryId, NewOrder, NewProduct, Order, OrderId, OrderItem, Product, ProductId,
    Result, UserId,
};

/// The catalog of products and their sold flags.
///
/// `mark_sold` and `release` are the only writes to the sold flag, and both
/// are conditional: implementations must make each one linearizable per
/// product. The checkout engine resolves races through them and never locks
/// on its own.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Retrieves a product. Returns None if it does not exist.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Retrieves every product that exists among `ids`, in no particular order.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Claims an unsold product.
    ///
    /// Succeeds only if the product is currently unsold, returning it as it
    /// was at the instant of the claim. Fails with `Conflict` and no side
    /// effect if it is already sold, or `ProductNotFound` if it is gone.
    async fn mark_sold(&self, id: ProductId) -> Result<Product>;

    /// Undoes a claim made by `mark_sold`.
    ///
    /// Succeeds only if the product is sold and no order line references it;
    /// otherwise fails with `Conflict`.
    async fn release(&self, id: ProductId) -> Result<()>;

    /// Lists a new product.
    async fn list_product(&self, product: NewProduct) -> Result<Product>;

    /// Removes an unsold product. A sold product cannot be delisted.
    async fn delist_product(&self, id: ProductId) -> Result<()>;
}

/// Per-user carts.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns every entry in a user's cart, oldest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<CartEntry>>;

    /// Finds the entry for a (user, product) pair.
    async fn find(&self, user_id: UserId, product_id: ProductId) -> Result<Option<CartEntry>>;

    /// Adds a product to a user's cart.
    ///
    /// Fails with `AlreadyExists` if the pair is already present.
    async fn insert(&self, user_id: UserId, product_id: ProductId) -> Result<CartEntry>;

    /// Removes an entry on behalf of `requester`.
    ///
    /// Fails with `CartEntryNotFound` if the entry is gone and `Forbidden` if
    /// the requester does not own it.
    async fn remove(&self, entry_id: CartEntryId, requester: UserId) -> Result<()>;

    /// Removes every listed entry that still exists. Returns how many were removed.
    async fn clear(&self, entry_ids: &[CartEntryId]) -> Result<usize>;
}

/// The append-only ledger of completed orders.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Records an order and its lines, and deletes the consumed cart entries,
    /// in one durable transaction.
    ///
    /// Every line's product must be sold and not referenced by any other
    /// order line; otherwise the write fails with `Integrity` and nothing is
    /// recorded.
    async fn commit_order(&self, order: NewOrder, consumed: &[CartEntryId]) -> Result<Order>;

    /// Retrieves an order with its lines.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Returns every order placed by a user, oldest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Returns the order line that sold a product, if any.
    async fn order_item_for_product(&self, product_id: ProductId) -> Result<Option<OrderItem>>;
}
