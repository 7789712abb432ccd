//! Read-only cart view.

use common::Money;
use serde::Serialize;
use store::{CartEntry, Product};

use super::StaleEntry;

/// A purchasable cart line: the entry and its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub entry: CartEntry,
    pub product: Product,
}

/// A user's cart as it would check out right now.
///
/// Stale entries are reported alongside the purchasable ones rather than
/// failing the read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    /// Sum of the current prices of `items`.
    pub total: Money,
    pub unavailable: Vec<StaleEntry>,
}

impl CartView {
    /// Returns true if the cart has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.unavailable.is_empty()
    }

    /// Returns true if every entry can be checked out.
    pub fn is_checkout_ready(&self) -> bool {
        !self.items.is_empty() && self.unavailable.is_empty()
    }
}
