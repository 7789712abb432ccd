//! Cart mutation service.

use std::collections::HashMap;

use common::{CartEntryId, Money, ProductId, UserId};
use store::{CartEntry, CartStore, CatalogStore};

use super::{CartLine, CartView, classify_entry};
use crate::error::CartError;

/// Service for managing carts.
///
/// Every check made here is advisory: a cart entry does not reserve its
/// product, and the checkout engine re-validates everything.
pub struct CartService<C, K>
where
    C: CatalogStore,
    K: CartStore,
{
    catalog: C,
    carts: K,
}

impl<C, K> CartService<C, K>
where
    C: CatalogStore,
    K: CartStore,
{
    /// Creates a new cart service.
    pub fn new(catalog: C, carts: K) -> Self {
        Self { catalog, carts }
    }

    /// Adds a product to a user's cart.
    ///
    /// A seller adding their own product always gets `SelfPurchaseForbidden`,
    /// whether or not the product is still available.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<CartEntry, CartError> {
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;

        if product.seller_id == user_id {
            return Err(CartError::SelfPurchaseForbidden(product_id));
        }

        if product.sold {
            return Err(CartError::ProductUnavailable(product_id));
        }

        if let Some(existing) = self.carts.find(user_id, product_id).await? {
            return Err(CartError::AlreadyInCart {
                product_id,
                entry_id: existing.id,
            });
        }

        // A concurrent add of the same pair surfaces here as AlreadyExists.
        let entry = self.carts.insert(user_id, product_id).await?;

        metrics::counter!("cart_additions_total").increment(1);
        tracing::info!(entry_id = %entry.id, "product added to cart");
        Ok(entry)
    }

    /// Removes an entry from the caller's cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_from_cart(
        &self,
        user_id: UserId,
        entry_id: CartEntryId,
    ) -> Result<(), CartError> {
        self.carts.remove(entry_id, user_id).await?;

        metrics::counter!("cart_removals_total").increment(1);
        tracing::info!("cart entry removed");
        Ok(())
    }

    /// Returns the user's cart with purchasable and stale entries separated.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<CartView, CartError> {
        let entries = self.carts.list_for_user(user_id).await?;
        let ids: Vec<ProductId> = entries.iter().map(|e| e.product_id).collect();
        let products: HashMap<ProductId, _> = self
            .catalog
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut items = Vec::new();
        let mut unavailable = Vec::new();
        for entry in entries {
            match classify_entry(&entry, products.get(&entry.product_id)) {
                Ok(product) => items.push(CartLine {
                    product: product.clone(),
                    entry,
                }),
                Err(stale) => unavailable.push(stale),
            }
        }

        let total: Money = items.iter().map(|line| line.product.price).sum();

        Ok(CartView {
            items,
            total,
            unavailable,
        })
    }
}
