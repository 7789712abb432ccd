//! Checkout transaction engine.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use common::{CartEntryId, ProductId, UserId};
use domain::{StaleEntry, UnavailableReason, classify_entry};
use serde::Serialize;
use store::{
    CartEntry, CartStore, CatalogStore, NewOrder, NewOrderItem, Order, OrderLedger, Product,
    StoreError,
};

use crate::error::{CheckoutError, Result};
use crate::state::CheckoutState;

/// Everything a successful checkout wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutReceipt {
    /// The recorded order with its lines.
    pub order: Order,
    /// Cart entries consumed into the order.
    pub cleared_entries: Vec<CartEntryId>,
    /// Products flipped to sold, in claim order.
    pub claimed: Vec<ProductId>,
}

/// Converts a user's cart into an order, all or nothing.
///
/// The engine never locks. Races between checkouts are settled by the
/// catalog's conditional `mark_sold`; any failure after the first claim is
/// undone by releasing every claim this attempt made, in reverse order.
pub struct CheckoutEngine<C, K, L>
where
    C: CatalogStore,
    K: CartStore,
    L: OrderLedger,
{
    catalog: C,
    carts: K,
    ledger: L,
}

impl<C, K, L> CheckoutEngine<C, K, L>
where
    C: CatalogStore,
    K: CartStore,
    L: OrderLedger,
{
    /// Creates a new checkout engine.
    pub fn new(catalog: C, carts: K, ledger: L) -> Self {
        Self {
            catalog,
            carts,
            ledger,
        }
    }

    /// Checks out the user's whole cart.
    #[tracing::instrument(skip(self, shipping_address))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        shipping_address: String,
    ) -> Result<CheckoutReceipt> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let result = self.run(user_id, shipping_address).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                metrics::counter!("checkout_committed_total").increment(1);
                tracing::info!(
                    order_id = %receipt.order.id,
                    items = receipt.order.items.len(),
                    total = %receipt.order.total_amount,
                    "checkout committed"
                );
            }
            Err(err) => {
                match err.final_state() {
                    Some(CheckoutState::Rejected) => {
                        metrics::counter!("checkout_rejected_total").increment(1)
                    }
                    Some(CheckoutState::PartiallyConflicted) => {
                        metrics::counter!("checkout_conflicts_total").increment(1)
                    }
                    _ => metrics::counter!("checkout_failed_total").increment(1),
                }
                tracing::warn!(error = %err, "checkout aborted");
            }
        }

        result
    }

    async fn run(&self, user_id: UserId, shipping_address: String) -> Result<CheckoutReceipt> {
        let mut state = CheckoutState::Initiated;

        // 1. Load
        let entries = self.carts.list_for_user(user_id).await?;
        if entries.is_empty() {
            advance(state, CheckoutState::Rejected)?;
            return Err(CheckoutError::EmptyCart(user_id));
        }

        // 2. Validate
        state = advance(state, CheckoutState::Validating)?;
        let stale = self.find_stale(&entries).await?;
        if !stale.is_empty() {
            let during = advance(state, CheckoutState::Rejected)?;
            return Err(CheckoutError::ItemsUnavailable {
                items: stale,
                during,
            });
        }

        // 3. Reserve
        state = advance(state, CheckoutState::Reserving)?;
        let mut claimed: Vec<Product> = Vec::with_capacity(entries.len());
        for entry in &entries {
            match self.catalog.mark_sold(entry.product_id).await {
                Ok(product) => claimed.push(product),
                Err(err) => return Err(self.abort_reservation(state, entry, err, &claimed).await?),
            }
        }

        // 4. Materialize
        let order = NewOrder {
            user_id,
            shipping_address,
            created_at: Utc::now(),
            items: claimed.iter().map(NewOrderItem::from).collect(),
        };
        let consumed: Vec<CartEntryId> = entries.iter().map(|e| e.id).collect();

        match self.ledger.commit_order(order, &consumed).await {
            Ok(order) => {
                advance(state, CheckoutState::Committed)?;
                Ok(CheckoutReceipt {
                    order,
                    cleared_entries: consumed,
                    claimed: claimed.iter().map(|p| p.id).collect(),
                })
            }
            Err(StoreError::CartChanged(gone)) => {
                advance(state, CheckoutState::PartiallyConflicted)?;
                tracing::warn!(entries = ?gone, "cart changed during checkout, releasing claims");
                let released = self.compensate(&claimed).await;
                Err(CheckoutError::CartChanged {
                    entries: gone,
                    released,
                })
            }
            Err(err) => {
                advance(state, CheckoutState::Failed)?;
                tracing::error!(error = %err, "order commit failed, releasing claims");
                let released = self.compensate(&claimed).await;
                Err(CheckoutError::CheckoutFailed {
                    reason: err.to_string(),
                    released,
                })
            }
        }
    }

    /// Returns every entry whose product is missing or sold.
    async fn find_stale(&self, entries: &[CartEntry]) -> Result<Vec<StaleEntry>> {
        let ids: Vec<ProductId> = entries.iter().map(|e| e.product_id).collect();
        let products: HashMap<ProductId, Product> = self
            .catalog
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(entries
            .iter()
            .filter_map(|entry| classify_entry(entry, products.get(&entry.product_id)).err())
            .collect())
    }

    /// Releases the claims made so far and builds the error for a failed claim.
    async fn abort_reservation(
        &self,
        state: CheckoutState,
        entry: &CartEntry,
        err: StoreError,
        claimed: &[Product],
    ) -> Result<CheckoutError> {
        let reason = match err {
            StoreError::Conflict(_) => Some(UnavailableReason::Sold),
            StoreError::ProductNotFound(_) => Some(UnavailableReason::Missing),
            _ => None,
        };

        match reason {
            Some(reason) => {
                let during = advance(state, CheckoutState::PartiallyConflicted)?;
                tracing::warn!(
                    product_id = %entry.product_id,
                    %reason,
                    claimed = claimed.len(),
                    "lost reservation race, releasing claims"
                );
                self.compensate(claimed).await;
                Ok(CheckoutError::ItemsUnavailable {
                    items: vec![StaleEntry::new(entry, reason)],
                    during,
                })
            }
            None => {
                advance(state, CheckoutState::Failed)?;
                tracing::error!(product_id = %entry.product_id, error = %err, "claim failed, releasing claims");
                let released = self.compensate(claimed).await;
                Ok(CheckoutError::CheckoutFailed {
                    reason: err.to_string(),
                    released,
                })
            }
        }
    }

    /// Releases claims in reverse order. Returns the products actually released.
    ///
    /// A failed release is logged and counted; the remaining claims are still
    /// released.
    async fn compensate(&self, claimed: &[Product]) -> Vec<ProductId> {
        let mut released = Vec::with_capacity(claimed.len());
        for product in claimed.iter().rev() {
            match self.catalog.release(product.id).await {
                Ok(()) => released.push(product.id),
                Err(e) => {
                    metrics::counter!("checkout_compensation_failures_total").increment(1);
                    tracing::error!(product_id = %product.id, error = %e, "failed to release claimed product");
                }
            }
        }
        released
    }
}

fn advance(from: CheckoutState, to: CheckoutState) -> Result<CheckoutState> {
    if !from.can_transition_to(to) {
        return Err(CheckoutError::InvalidTransition { from, to });
    }
    tracing::debug!(%from, %to, "checkout state changed");
    Ok(to)
}
