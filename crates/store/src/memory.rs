use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    CartEntry, CartEntryId, NewOrder, NewProduct, Order, OrderId, OrderItem, OrderItemId, Product,
    ProductId, Result, StoreError, UserId,
    store::{CartStore, CatalogStore, OrderLedger},
};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    cart_entries: BTreeMap<CartEntryId, CartEntry>,
    orders: BTreeMap<OrderId, Order>,
    /// Product -> order line that sold it. Mirrors `UNIQUE (product_id)`.
    sold_by: BTreeMap<ProductId, OrderItemId>,
    last_product_id: i64,
    last_cart_entry_id: i64,
    last_order_id: i64,
    last_order_item_id: i64,
}

/// In-memory implementation of all three stores, for tests and local runs.
///
/// Each operation takes the write lock for its whole duration, which gives
/// the same per-row atomicity as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    writes: Arc<AtomicU64>,
    fail_on_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `commit_order` fail with `Unavailable` until reset.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of successful writes across all relations.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns the total number of cart entries across all users.
    pub async fn cart_entry_count(&self) -> usize {
        self.state.read().await.cart_entries.len()
    }

    /// Returns the total number of recorded orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns every product in the catalog, by id.
    pub async fn all_products(&self) -> Vec<Product> {
        self.state.read().await.products.values().cloned().collect()
    }

    /// Returns every recorded order line, by order.
    pub async fn all_order_items(&self) -> Vec<OrderItem> {
        self.state
            .read()
            .await
            .orders
            .values()
            .flat_map(|order| order.items.iter().cloned())
            .collect()
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn mark_sold(&self, id: ProductId) -> Result<Product> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or(StoreError::ProductNotFound(id))?;

        if product.sold {
            return Err(StoreError::Conflict(id));
        }

        product.sold = true;
        product.updated_at = Utc::now();
        let claimed = product.clone();
        self.record_write();
        Ok(claimed)
    }

    async fn release(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.sold_by.contains_key(&id) {
            return Err(StoreError::Conflict(id));
        }

        let product = state
            .products
            .get_mut(&id)
            .ok_or(StoreError::ProductNotFound(id))?;

        if !product.sold {
            return Err(StoreError::Conflict(id));
        }

        product.sold = false;
        product.updated_at = Utc::now();
        self.record_write();
        Ok(())
    }

    async fn list_product(&self, new: NewProduct) -> Result<Product> {
        let mut state = self.state.write().await;
        state.last_product_id += 1;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(state.last_product_id),
            seller_id: new.seller_id,
            title: new.title,
            description: new.description,
            price: new.price,
            condition: new.condition,
            category: new.category,
            image_url: new.image_url,
            sold: false,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(product.id, product.clone());
        self.record_write();
        Ok(product)
    }

    async fn delist_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        match state.products.get(&id) {
            None => return Err(StoreError::ProductNotFound(id)),
            Some(product) if product.sold => return Err(StoreError::Conflict(id)),
            Some(_) => {}
        }
        state.products.remove(&id);
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<CartEntry>> {
        let state = self.state.read().await;
        Ok(state
            .cart_entries
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find(&self, user_id: UserId, product_id: ProductId) -> Result<Option<CartEntry>> {
        let state = self.state.read().await;
        Ok(state
            .cart_entries
            .values()
            .find(|e| e.user_id == user_id && e.product_id == product_id)
            .cloned())
    }

    async fn insert(&self, user_id: UserId, product_id: ProductId) -> Result<CartEntry> {
        let mut state = self.state.write().await;

        // Unique (user_id, product_id) constraint simulation
        if let Some(existing) = state
            .cart_entries
            .values()
            .find(|e| e.user_id == user_id && e.product_id == product_id)
        {
            return Err(StoreError::AlreadyExists {
                user_id,
                product_id,
                existing: existing.id,
            });
        }

        state.last_cart_entry_id += 1;
        let entry = CartEntry {
            id: CartEntryId::new(state.last_cart_entry_id),
            user_id,
            product_id,
            created_at: Utc::now(),
        };
        state.cart_entries.insert(entry.id, entry.clone());
        self.record_write();
        Ok(entry)
    }

    async fn remove(&self, entry_id: CartEntryId, requester: UserId) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state
            .cart_entries
            .get(&entry_id)
            .ok_or(StoreError::CartEntryNotFound(entry_id))?;

        if entry.user_id != requester {
            return Err(StoreError::Forbidden {
                entry_id,
                requester,
            });
        }

        state.cart_entries.remove(&entry_id);
        self.record_write();
        Ok(())
    }

    async fn clear(&self, entry_ids: &[CartEntryId]) -> Result<usize> {
        let mut state = self.state.write().await;
        let removed = entry_ids
            .iter()
            .filter(|id| state.cart_entries.remove(*id).is_some())
            .count();
        if removed > 0 {
            self.record_write();
        }
        Ok(removed)
    }
}

#[async_trait]
impl OrderLedger for InMemoryStore {
    async fn commit_order(&self, new: NewOrder, consumed: &[CartEntryId]) -> Result<Order> {
        if self.fail_on_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "order ledger rejected the write".to_string(),
            ));
        }

        let mut state = self.state.write().await;

        // Validate everything before touching any relation.
        for item in &new.items {
            match state.products.get(&item.product_id) {
                Some(product) if product.sold => {}
                Some(_) => {
                    return Err(StoreError::Integrity(format!(
                        "product {} is not marked sold",
                        item.product_id
                    )));
                }
                None => return Err(StoreError::ProductNotFound(item.product_id)),
            }
            if state.sold_by.contains_key(&item.product_id) {
                return Err(StoreError::Integrity(format!(
                    "product {} already has an order line",
                    item.product_id
                )));
            }
        }

        let gone: Vec<CartEntryId> = consumed
            .iter()
            .filter(|id| {
                state
                    .cart_entries
                    .get(*id)
                    .is_none_or(|entry| entry.user_id != new.user_id)
            })
            .copied()
            .collect();
        if !gone.is_empty() {
            return Err(StoreError::CartChanged(gone));
        }

        state.last_order_id += 1;
        let order_id = OrderId::new(state.last_order_id);
        let total_amount = new.total_amount();

        let mut items = Vec::with_capacity(new.items.len());
        for line in new.items {
            state.last_order_item_id += 1;
            let item = OrderItem {
                id: OrderItemId::new(state.last_order_item_id),
                order_id,
                product_id: line.product_id,
                price_at_sale: line.price_at_sale,
                title_at_sale: line.title_at_sale,
            };
            state.sold_by.insert(item.product_id, item.id);
            items.push(item);
        }

        let order = Order {
            id: order_id,
            user_id: new.user_id,
            total_amount,
            shipping_address: new.shipping_address,
            created_at: new.created_at,
            items,
        };
        state.orders.insert(order_id, order.clone());

        for id in consumed {
            state.cart_entries.remove(id);
        }

        self.record_write();
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn order_item_for_product(&self, product_id: ProductId) -> Result<Option<OrderItem>> {
        let state = self.state.read().await;
        let Some(item_id) = state.sold_by.get(&product_id) else {
            return Ok(None);
        };
        Ok(state
            .orders
            .values()
            .flat_map(|o| o.items.iter())
            .find(|item| item.id == *item_id)
            .cloned())
    }
}
